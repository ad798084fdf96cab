// Server half of the download exchange

use std::io::{Read, Seek, SeekFrom, Write};
use log::{debug, info, warn};
use crate::common::config::ServerConfig;
use crate::common::error::{Error, Result};
use crate::common::utils::{open_regular_file, read_chunk};
use crate::protocol::messages::{DownloadReply, DownloadRequest, ResumeOffset};

/// Serve `request` over `stream`: answer whether the file exists and, if it
/// does, stream it from the client's resume offset to the end.
///
/// # Returns
/// The number of content bytes sent, or 0 when the file is missing.
pub fn send_download<S: Read + Write>(
    stream: &mut S,
    request: &DownloadRequest,
    config: &ServerConfig,
) -> Result<u64> {
    let path = config.root_dir.join(&request.filename);
    info!("Server: download requested: {}", request.filename);

    let (mut file, size) = match open_regular_file(&path) {
        Some(source) => source,
        None => {
            info!("Server: {} does not exist, request rejected", request.filename);
            DownloadReply::Missing.write_to(stream)?;
            stream.flush()?;
            return Ok(0);
        }
    };

    let mut header = Vec::with_capacity(9);
    DownloadReply::Present { size }.write_to(&mut header)?;
    stream.write_all(&header).map_err(Error::from_read)?;
    stream.flush()?;

    let ResumeOffset(offset) = ResumeOffset::read_from(stream)?;
    info!("Server: file size {} bytes, starting download at {} bytes", size, offset);
    if offset > size {
        warn!(
            "Server: client offset {} is past the end of {} ({} bytes), nothing to send",
            offset, request.filename, size
        );
        return Ok(0);
    }

    file.seek(SeekFrom::Start(offset))?;
    let mut source = file.take(size - offset);
    let mut buf = vec![0u8; config.chunk_size];
    let mut position = offset;

    loop {
        let n = read_chunk(&mut source, &mut buf)?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n]).map_err(Error::from_read)?;
        position += n as u64;
        debug!("Server: sent chunk of {} bytes ({}/{})", n, position, size);
    }
    stream.flush()?;

    info!("Server: sending {} complete", request.filename);
    Ok(position - offset)
}
