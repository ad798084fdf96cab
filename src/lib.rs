//! Resumable single-file transfer over raw TCP.
//!
//! A client uploads or downloads one named file; when the connection drops,
//! the [`client::ResumeController`] reconnects and continues from the byte
//! offset the receiving side already holds.

pub mod client;
pub mod common;
pub mod protocol;
pub mod server;

pub use client::{ResumeController, TransferSummary};
pub use common::{ClientConfig, Error, Result, ServerConfig, TransferOutcome};
pub use server::Server;
