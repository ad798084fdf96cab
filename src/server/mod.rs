// Server module - TCP listener and per-connection dispatch

mod download;
mod registry;
mod session;
mod upload;

pub use download::send_download;
pub use registry::{UploadClaim, UploadRegistry};
pub use session::ConnectionSession;
pub use upload::receive_upload;

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use log::{debug, error, info, warn};
use crate::common::config::ServerConfig;
use crate::common::error::Result;

/// Main transfer server
pub struct Server {
    config: Arc<ServerConfig>,
    listener: TcpListener,
    active: Arc<AtomicUsize>,
    uploads: Arc<UploadRegistry>,
}

impl Server {
    /// Bind the listening socket. Use port 0 to let the OS pick one.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr)?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self {
            config: Arc::new(config),
            listener,
            active: Arc::new(AtomicUsize::new(0)),
            uploads: Arc::new(UploadRegistry::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Accept connections forever, serving each on its own thread.
    pub fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_session(stream, peer),
                Err(e) => warn!("Server: accept failed: {}", e),
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let guard = match ActiveGuard::acquire(&self.active, self.config.max_connections) {
            Some(guard) => guard,
            None => {
                warn!(
                    "Server: refusing {}, {} connections already active",
                    peer, self.config.max_connections
                );
                return;
            }
        };

        debug!("Server: accepted {} ({} active)", peer, self.active_connections());

        let config = Arc::clone(&self.config);
        let uploads = Arc::clone(&self.uploads);
        let spawned = thread::Builder::new()
            .name(format!("rftx-conn-{}", peer))
            .spawn(move || {
                let _guard = guard;
                ConnectionSession::new(stream, peer, config, uploads).run();
            });

        if let Err(e) = spawned {
            error!("Server: failed to spawn handler for {}: {}", peer, e);
        }
    }
}

/// Counts one active connection for as long as it is alive.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn acquire(active: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        let previous = active.fetch_add(1, Ordering::SeqCst);
        if previous >= max {
            active.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(Self {
            active: Arc::clone(active),
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), dir.path().to_path_buf());
        let server = Server::bind(config).unwrap();

        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.active_connections(), 0);
        assert_eq!(server.config().chunk_size, 8192);
    }

    #[test]
    fn test_active_guard_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let first = ActiveGuard::acquire(&active, 2).unwrap();
        let second = ActiveGuard::acquire(&active, 2).unwrap();
        assert!(ActiveGuard::acquire(&active, 2).is_none());
        assert_eq!(active.load(Ordering::SeqCst), 2);

        drop(first);
        assert_eq!(active.load(Ordering::SeqCst), 1);
        let third = ActiveGuard::acquire(&active, 2);
        assert!(third.is_some());

        drop(second);
        drop(third);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}
