// Client half of the upload exchange

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use log::{debug, error, info, warn};
use crate::common::config::ClientConfig;
use crate::common::error::{Error, Result};
use crate::common::types::{AttemptReport, Rejection, TransferOutcome};
use crate::common::utils::{open_regular_file, read_chunk};
use crate::protocol::messages::{ResumeOffset, UploadRequest};
use super::connection::connect;
use super::progress::TransferObserver;

/// Inputs for one upload attempt.
pub struct UploadAttempt<'a> {
    pub config: &'a ClientConfig,
    pub local_path: &'a Path,
    pub remote_name: &'a str,
    pub is_new_file: bool,
    /// Offset reported if the attempt fails before the server answers.
    pub known_offset: u64,
}

impl<'a> UploadAttempt<'a> {
    /// Run one connection lifecycle of the upload exchange.
    ///
    /// A missing local source is rejected before any connection is opened.
    /// Every other failure becomes `Retry` with the last offset known to be
    /// on the server.
    pub fn run(&self, observer: &dyn TransferObserver) -> AttemptReport {
        let (file, size) = match open_regular_file(self.local_path) {
            Some(source) => source,
            None => {
                warn!("Client: {:?} does not exist, upload rejected", self.local_path);
                return AttemptReport::new(TransferOutcome::Rejected(Rejection::LocalFileMissing));
            }
        };

        let mut report = AttemptReport::new(TransferOutcome::Retry(self.known_offset));
        match self.send(file, size, &mut report, observer) {
            Ok(()) => {
                report.outcome = TransferOutcome::Completed;
                info!("Client: sent {}, upload complete", self.remote_name);
            }
            Err(e @ Error::LocalFile { .. }) => {
                error!("Client: upload of {} failed locally: {}", self.remote_name, e);
                report.outcome = TransferOutcome::Rejected(Rejection::LocalFileError);
            }
            Err(e) => {
                let offset = report
                    .resume_offset
                    .map(|o| o + report.bytes_transferred)
                    .unwrap_or(self.known_offset);
                warn!("Client: upload of {} interrupted at {} bytes: {}", self.remote_name, offset, e);
                report.outcome = TransferOutcome::Retry(offset);
            }
        }
        report
    }

    fn send(
        &self,
        mut file: File,
        size: u64,
        report: &mut AttemptReport,
        observer: &dyn TransferObserver,
    ) -> Result<()> {
        let mut stream = connect(self.config)?;

        let request = UploadRequest::new(self.remote_name, size, self.is_new_file);
        let mut header = Vec::new();
        request.write_to(&mut header)?;
        stream.write_all(&header).map_err(Error::from_read)?;

        let ResumeOffset(offset) = ResumeOffset::read_from(&mut stream)?;
        report.resume_offset = Some(offset);
        observer.on_resume(offset.min(size), size);
        info!("Client: file size {} bytes, starting upload at {} bytes", size, offset);

        if offset > size {
            warn!(
                "Client: server already holds {} bytes of {}, more than the {} byte source",
                offset, self.remote_name, size
            );
        } else {
            let local = |e| Error::local_file(self.local_path, e);
            file.seek(SeekFrom::Start(offset)).map_err(local)?;
            let mut source = file.take(size - offset);
            let mut buf = vec![0u8; self.config.chunk_size];
            let mut position = offset;

            loop {
                let n = read_chunk(&mut source, &mut buf).map_err(local)?;
                if n == 0 {
                    break;
                }
                stream.write_all(&buf[..n]).map_err(Error::from_read)?;
                position += n as u64;
                report.bytes_transferred += n as u64;
                debug!("Client: sent chunk of {} bytes ({}/{})", n, position, size);
                observer.on_chunk(n, position, size);
            }

            if position < size {
                return Err(local(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source shrank to {} bytes during upload", position),
                )));
            }
        }

        wait_for_close(stream)
    }
}

/// Half-close our side and wait for the server to close its side, which it
/// does only after the destination file is flushed and closed.
fn wait_for_close(mut stream: TcpStream) -> Result<()> {
    stream.shutdown(Shutdown::Write)?;
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => debug!("Client: ignoring {} trailing bytes from server", n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from_read(e)),
        }
    }
}
