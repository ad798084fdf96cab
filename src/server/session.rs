// Per-connection request dispatch

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use log::{error, info, warn};
use crate::common::config::ServerConfig;
use crate::common::error::Result;
use crate::protocol::messages::Request;
use super::download::send_download;
use super::registry::UploadRegistry;
use super::upload::receive_upload;

/// Everything one accepted connection needs. Nothing here is shared with
/// other connections apart from the read-only config and the registry of
/// destinations being uploaded.
pub struct ConnectionSession {
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
    uploads: Arc<UploadRegistry>,
}

impl ConnectionSession {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        config: Arc<ServerConfig>,
        uploads: Arc<UploadRegistry>,
    ) -> Self {
        Self {
            stream,
            peer,
            config,
            uploads,
        }
    }

    /// Serve the single request carried by this connection, then close it.
    /// Failures are logged and end the connection without any reply.
    pub fn run(mut self) {
        info!("Server: client {} connected", self.peer);

        match self.dispatch() {
            Ok(request) => info!("Server: {} request from {} finished", request, self.peer),
            Err(e) if e.is_transport() => {
                warn!("Server: connection from {} dropped: {}", self.peer, e)
            }
            Err(e) => error!("Server: connection from {} failed: {}", self.peer, e),
        }

        // Exchange halves have already flushed and closed their files
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn dispatch(&mut self) -> Result<&'static str> {
        self.stream.set_read_timeout(Some(self.config.timeout))?;
        self.stream.set_write_timeout(Some(self.config.timeout))?;

        let request = Request::read_from(&mut self.stream)?;
        match &request {
            Request::Upload(upload) => {
                // Held until the destination file is closed
                let path = self.config.root_dir.join(&upload.filename);
                let cut_handle = self.stream.try_clone().ok();
                let _claim = self.uploads.claim(&path, cut_handle, self.config.timeout)?;
                receive_upload(&mut self.stream, upload, &self.config)?;
            }
            Request::Download(download) => {
                send_download(&mut self.stream, download, &self.config)?;
            }
            Request::Ping => info!("Server: client {} pinged server connection", self.peer),
        }
        Ok(request.opcode().as_str())
    }
}
