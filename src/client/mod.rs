// Client module - transfer attempts and the resume loop around them

mod connection;
mod download;
mod progress;
mod resume;
mod upload;

pub use connection::{connect, ping};
pub use download::DownloadAttempt;
pub use progress::{NoopObserver, ProgressBarObserver, TransferObserver};
pub use resume::{Backoff, Bounded, ResumeController, RetryPolicy, TransferSummary, Unbounded};
pub use upload::UploadAttempt;
