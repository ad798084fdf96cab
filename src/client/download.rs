// Client half of the download exchange

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use log::{debug, error, info, warn};
use crate::common::config::ClientConfig;
use crate::common::error::{Error, Result};
use crate::common::types::{AttemptReport, Rejection, TransferOutcome};
use crate::protocol::messages::{DownloadReply, DownloadRequest, ResumeOffset};
use super::connection::connect;
use super::progress::TransferObserver;

/// Inputs for one download attempt.
pub struct DownloadAttempt<'a> {
    pub config: &'a ClientConfig,
    pub remote_name: &'a str,
    pub local_path: &'a Path,
    /// Discard any existing local file once the server confirms the source exists.
    pub fresh: bool,
    /// Offset reported if the attempt fails before the local file is opened.
    pub known_offset: u64,
}

enum Received {
    Complete,
    Missing,
}

impl<'a> DownloadAttempt<'a> {
    /// Run one connection lifecycle of the download exchange.
    ///
    /// The resume offset sent to the server is always the current length of
    /// the local file. Nothing local is created or touched when the server
    /// reports the file missing.
    pub fn run(&self, observer: &dyn TransferObserver) -> AttemptReport {
        let mut report = AttemptReport::new(TransferOutcome::Retry(self.known_offset));
        match self.receive(&mut report, observer) {
            Ok(Received::Complete) => {
                report.outcome = TransferOutcome::Completed;
                info!("Client: received {}, download complete", self.remote_name);
            }
            Ok(Received::Missing) => {
                warn!("Client: {} does not exist on server, download rejected", self.remote_name);
                report.outcome = TransferOutcome::Rejected(Rejection::RemoteFileMissing);
            }
            Err(e @ Error::LocalFile { .. }) => {
                error!("Client: download of {} failed locally: {}", self.remote_name, e);
                report.outcome = TransferOutcome::Rejected(Rejection::LocalFileError);
            }
            Err(e) => {
                let offset = report
                    .resume_offset
                    .map(|o| o + report.bytes_transferred)
                    .unwrap_or(self.known_offset);
                warn!("Client: download of {} interrupted at {} bytes: {}", self.remote_name, offset, e);
                report.outcome = TransferOutcome::Retry(offset);
            }
        }
        report
    }

    fn receive(&self, report: &mut AttemptReport, observer: &dyn TransferObserver) -> Result<Received> {
        let mut stream = connect(self.config)?;

        let mut header = Vec::new();
        DownloadRequest::new(self.remote_name).write_to(&mut header)?;
        stream.write_all(&header).map_err(Error::from_read)?;

        let size = match DownloadReply::read_from(&mut stream)? {
            DownloadReply::Missing => return Ok(Received::Missing),
            DownloadReply::Present { size } => size,
        };

        let local = |e| Error::local_file(self.local_path, e);
        let (mut file, offset) = open_destination(self.local_path, self.fresh).map_err(local)?;
        report.resume_offset = Some(offset);
        ResumeOffset(offset).write_to(&mut stream)?;
        stream.flush()?;

        observer.on_resume(offset.min(size), size);
        info!("Client: file size {} bytes, starting download at {} bytes", size, offset);
        if offset > size {
            warn!(
                "Client: local {:?} holds {} bytes, more than the {} byte remote file",
                self.local_path, offset, size
            );
        }

        let mut buf = vec![0u8; self.config.chunk_size];
        let mut position = offset;
        while position < size {
            let want = buf.len().min((size - position) as usize);
            let n = stream.read(&mut buf[..want]).map_err(Error::from_read)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            file.write_all(&buf[..n]).map_err(local)?;
            position += n as u64;
            report.bytes_transferred += n as u64;
            debug!("Client: received chunk of {} bytes ({}/{})", n, position, size);
            observer.on_chunk(n, position, size);
        }

        file.flush().map_err(local)?;
        Ok(Received::Complete)
    }
}

/// Open the local destination for appending and return it with the number of
/// bytes it already holds.
fn open_destination(path: &Path, fresh: bool) -> io::Result<(File, u64)> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(fresh)
        .open(path)?;
    let offset = file.metadata()?.len();
    file.seek(SeekFrom::End(0))?;
    Ok((file, offset))
}
