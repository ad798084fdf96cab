// Common type definitions and constants

use std::fmt;
use std::time::Duration;
use serde::{Serialize, Deserialize};

// Constants
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024; // 1MB
pub const MIN_CHUNK_SIZE: usize = 512;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Upper bound for a decoded string frame. Filenames and opcodes are short;
/// anything larger is treated as a corrupt length prefix.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Request kind, carried as the first string frame of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Upload,
    Download,
    Ping,
}

impl Opcode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::Upload => "upload",
            Opcode::Download => "download",
            Opcode::Ping => "ping",
        }
    }

    /// Opcodes are matched case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("upload") {
            Some(Opcode::Upload)
        } else if s.eq_ignore_ascii_case("download") {
            Some(Opcode::Download)
        } else if s.eq_ignore_ascii_case("ping") {
            Some(Opcode::Ping)
        } else {
            None
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Why a transfer was refused without retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// Download target does not exist on the server.
    RemoteFileMissing,
    /// Upload source does not exist locally; no connection was opened.
    LocalFileMissing,
    /// The local file could not be read or written.
    LocalFileError,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::RemoteFileMissing => f.write_str("file does not exist on server"),
            Rejection::LocalFileMissing => f.write_str("file does not exist locally"),
            Rejection::LocalFileError => f.write_str("local file could not be read or written"),
        }
    }
}

/// Result of one transfer attempt (one connection lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    Completed,
    Rejected(Rejection),
    /// Recoverable fault. Carries the last byte offset known to be on the
    /// receiving side when the attempt ended.
    Retry(u64),
}

impl TransferOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferOutcome::Retry(_))
    }
}

/// What a single exchange attempt reports back to the resume controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptReport {
    pub outcome: TransferOutcome,
    /// Offset negotiated at the start of the attempt, if the attempt got that far.
    pub resume_offset: Option<u64>,
    /// Content bytes moved over the wire during this attempt.
    pub bytes_transferred: u64,
}

impl AttemptReport {
    pub fn new(outcome: TransferOutcome) -> Self {
        Self {
            outcome,
            resume_offset: None,
            bytes_transferred: 0,
        }
    }
}
