// Server half of the upload exchange

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use log::{debug, info, warn};
use crate::common::config::ServerConfig;
use crate::common::error::{Error, Result};
use crate::protocol::messages::{ResumeOffset, UploadRequest};

/// Receive upload content for `request` from `stream`.
///
/// Reports the destination's current length as the resume offset, then
/// appends content until the file holds `declared_size` bytes. Each chunk is
/// written straight to the file, so its length always equals the bytes
/// actually received.
///
/// # Returns
/// The number of content bytes received on this connection.
pub fn receive_upload<S: Read + Write>(
    stream: &mut S,
    request: &UploadRequest,
    config: &ServerConfig,
) -> Result<u64> {
    let path = config.root_dir.join(&request.filename);
    info!(
        "Server: upload requested: {} ({} bytes, new file: {})",
        request.filename, request.declared_size, request.is_new_file
    );

    let mut file = open_destination(&path, request.is_new_file)?;
    let offset = file.metadata()?.len();
    ResumeOffset(offset).write_to(stream)?;
    stream.flush()?;

    info!("Server: receiving {} from {} bytes", request.filename, offset);
    if offset > request.declared_size {
        warn!(
            "Server: {} already holds {} bytes, more than the declared {}",
            request.filename, offset, request.declared_size
        );
    }

    let mut received = offset;
    copy_content(
        stream,
        &mut file,
        config.chunk_size,
        &mut received,
        request.declared_size,
    )?;

    info!("Server: received {} complete ({} bytes)", request.filename, received);
    Ok(received - offset)
}

/// Open the upload destination for appending. A new-file request replaces
/// whatever is already there.
fn open_destination(path: &Path, is_new_file: bool) -> Result<File> {
    if is_new_file {
        match fs::remove_file(path) {
            Ok(()) => debug!("Server: removed existing {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

fn copy_content<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    received: &mut u64,
    declared_size: u64,
) -> Result<()> {
    let mut buf = vec![0u8; chunk_size];
    while *received < declared_size {
        let want = buf.len().min((declared_size - *received) as usize);
        let n = reader.read(&mut buf[..want]).map_err(Error::from_read)?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        writer.write_all(&buf[..n])?;
        *received += n as u64;
        debug!("Server: received chunk of {} bytes ({}/{})", n, *received, declared_size);
    }
    Ok(())
}
