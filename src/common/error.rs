// Error types and error handling

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Protocol(String),
    UnknownOpcode(String),
    ConnectionClosed,
    TransferTimeout,
    /// Reading or writing the local side of a transfer failed.
    LocalFile { path: PathBuf, source: io::Error },
    /// Another upload of the same destination did not finish in time.
    DestinationBusy(String),
    ConfigError(String),
    DeserializationError(String),
}

impl Error {
    /// Whether this error is a recoverable transport fault: the link dropped,
    /// stalled, or delivered something unreadable. These end one transfer
    /// attempt and trigger a reconnect.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Protocol(_)
                | Error::UnknownOpcode(_)
                | Error::ConnectionClosed
                | Error::TransferTimeout
        )
    }

    /// Classify a socket read failure. A stream that ends before a frame is
    /// complete is reported as a closed connection, a receive timeout as a
    /// transfer timeout.
    pub fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::TransferTimeout,
            _ => Error::Io(err),
        }
    }

    pub fn local_file(path: &Path, source: io::Error) -> Self {
        Error::LocalFile {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::UnknownOpcode(op) => write!(f, "Unknown opcode: {:?}", op),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::TransferTimeout => write!(f, "Transfer timeout"),
            Error::LocalFile { path, source } => write!(f, "Local file {:?}: {}", path, source),
            Error::DestinationBusy(path) => write!(f, "Destination busy: {}", path),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::DeserializationError(e) => write!(f, "Deserialization error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::LocalFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::DeserializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_classification() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert!(matches!(Error::from_read(eof), Error::ConnectionClosed));

        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(Error::from_read(timeout), Error::TransferTimeout));

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(Error::from_read(reset), Error::Io(_)));
    }

    #[test]
    fn test_transport_faults() {
        assert!(Error::ConnectionClosed.is_transport());
        assert!(Error::TransferTimeout.is_transport());
        assert!(Error::Protocol("bad frame".into()).is_transport());
        assert!(!Error::DeserializationError("json".into()).is_transport());
        assert!(!Error::ConfigError("chunk".into()).is_transport());

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let local = Error::local_file(Path::new("out/a.bin"), denied);
        assert!(!local.is_transport());
        assert!(std::error::Error::source(&local).is_some());
    }
}
