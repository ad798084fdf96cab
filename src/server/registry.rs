// Tracks which upload destinations have a live handler

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use log::{debug, warn};
use crate::common::error::{Error, Result};

struct Holder {
    id: u64,
    /// Connection to cut when a newer upload of the same path arrives.
    stream: Option<TcpStream>,
}

#[derive(Default)]
struct Claims {
    next_id: u64,
    holders: HashMap<PathBuf, Holder>,
}

/// At most one live upload handler per destination path.
///
/// A reconnecting client can reach the server while the handler of its
/// previous connection is still blocked on a dead link. The newer upload cuts
/// that connection and waits until the old handler has closed the file, so
/// the resume offset it reports is the file's final length.
#[derive(Default)]
pub struct UploadRegistry {
    claims: Mutex<Claims>,
    released: Condvar,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` for a new upload, cutting any older upload of the same
    /// path and waiting up to `wait` for it to finish.
    pub fn claim(
        self: &Arc<Self>,
        path: &Path,
        stream: Option<TcpStream>,
        wait: Duration,
    ) -> Result<UploadClaim> {
        let deadline = Instant::now() + wait;
        let mut claims = self.lock();

        while let Some(holder) = claims.holders.get_mut(path) {
            if let Some(old) = holder.stream.take() {
                warn!("Server: cutting stale upload of {:?}", path);
                let _ = old.shutdown(Shutdown::Both);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::DestinationBusy(path.display().to_string()));
            }
            claims = self
                .released
                .wait_timeout(claims, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        claims.next_id += 1;
        let id = claims.next_id;
        claims.holders.insert(path.to_path_buf(), Holder { id, stream });
        debug!("Server: claimed {:?} for upload", path);

        Ok(UploadClaim {
            registry: Arc::clone(self),
            path: path.to_path_buf(),
            id,
        })
    }

    /// Number of destinations with a live upload.
    pub fn active(&self) -> usize {
        self.lock().holders.len()
    }

    fn lock(&self) -> MutexGuard<'_, Claims> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for as long as an upload handler may write its destination.
pub struct UploadClaim {
    registry: Arc<UploadRegistry>,
    path: PathBuf,
    id: u64,
}

impl Drop for UploadClaim {
    fn drop(&mut self) {
        let mut claims = self.registry.lock();
        if claims.holders.get(&self.path).map(|h| h.id) == Some(self.id) {
            claims.holders.remove(&self.path);
        }
        drop(claims);
        self.registry.released.notify_all();
    }
}
