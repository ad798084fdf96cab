// Resume controller: retries transfer attempts across reconnects

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use log::{info, warn};
use crate::common::config::ClientConfig;
use crate::common::types::{AttemptReport, TransferDirection, TransferOutcome};
use super::download::DownloadAttempt;
use super::progress::{NoopObserver, TransferObserver};
use super::upload::UploadAttempt;

/// Decides whether, and when, to reconnect after a recoverable fault.
pub trait RetryPolicy: Send {
    /// Called after attempt number `attempt` (1-based) ended in `Retry`.
    /// Returns the delay before the next attempt, or `None` to give up.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Forget any state from a previous transfer.
    fn reset(&mut self) {}
}

/// Reconnect immediately, forever.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl RetryPolicy for Unbounded {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Reconnect after a fixed delay, at most `max_attempts` attempts in total.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Bounded {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }
}

impl RetryPolicy for Bounded {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.delay)
        }
    }
}

/// Exponential backoff between attempts, doubling up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    max_attempts: Option<u32>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl RetryPolicy for Backoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Result of a whole logical transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    /// `Completed` or `Rejected`, or the last `Retry` if the policy gave up.
    pub outcome: TransferOutcome,
    pub attempts: u32,
    /// Resume offset negotiated by each attempt that got that far, in order.
    pub offsets: Vec<u64>,
    pub bytes_transferred: u64,
}

impl TransferSummary {
    pub fn is_completed(&self) -> bool {
        self.outcome == TransferOutcome::Completed
    }
}

/// Client-side loop that re-runs upload or download attempts until the
/// transfer completes, is rejected, or the retry policy gives up.
pub struct ResumeController {
    config: ClientConfig,
    policy: Box<dyn RetryPolicy>,
    observer: Arc<dyn TransferObserver>,
}

impl ResumeController {
    /// Controller with the default policy: unbounded immediate retries.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            policy: Box::new(Unbounded),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_policy<P: RetryPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upload `local_path` to the server under `remote_name`.
    ///
    /// `is_new_file` asks the server to discard any existing destination. It is
    /// only sent on attempts before the server has answered with an offset;
    /// once the server may hold partial content every reconnect continues it.
    pub fn upload(&mut self, local_path: &Path, remote_name: &str, is_new_file: bool) -> TransferSummary {
        info!("Client: uploading {:?} as {}", local_path, remote_name);
        let config = &self.config;
        let mut is_new_file = is_new_file;

        drive(
            TransferDirection::Upload,
            self.policy.as_mut(),
            self.observer.as_ref(),
            |known_offset, observer| {
                let report = UploadAttempt {
                    config,
                    local_path,
                    remote_name,
                    is_new_file,
                    known_offset,
                }
                .run(observer);
                if report.resume_offset.is_some() {
                    is_new_file = false;
                }
                report
            },
        )
    }

    /// Download `remote_name` from the server into `local_path`.
    ///
    /// With `fresh` set, an existing local file is discarded on the first
    /// attempt that reaches the server and finds the file present. Without it
    /// the download continues from whatever the local file already holds.
    pub fn download(&mut self, remote_name: &str, local_path: &Path, fresh: bool) -> TransferSummary {
        info!("Client: downloading {} to {:?}", remote_name, local_path);
        let config = &self.config;
        let mut fresh = fresh;

        drive(
            TransferDirection::Download,
            self.policy.as_mut(),
            self.observer.as_ref(),
            |known_offset, observer| {
                let report = DownloadAttempt {
                    config,
                    remote_name,
                    local_path,
                    fresh,
                    known_offset,
                }
                .run(observer);
                if report.resume_offset.is_some() {
                    fresh = false;
                }
                report
            },
        )
    }
}

/// Run attempts until a terminal outcome or until `policy` gives up.
fn drive<F>(
    direction: TransferDirection,
    policy: &mut dyn RetryPolicy,
    observer: &dyn TransferObserver,
    mut attempt: F,
) -> TransferSummary
where
    F: FnMut(u64, &dyn TransferObserver) -> AttemptReport,
{
    policy.reset();

    let mut summary = TransferSummary {
        outcome: TransferOutcome::Retry(0),
        attempts: 0,
        offsets: Vec::new(),
        bytes_transferred: 0,
    };
    let mut known_offset = 0;

    loop {
        summary.attempts += 1;
        observer.on_attempt(summary.attempts, direction);

        let report = attempt(known_offset, observer);
        summary.bytes_transferred += report.bytes_transferred;
        if let Some(offset) = report.resume_offset {
            summary.offsets.push(offset);
        }
        summary.outcome = report.outcome;

        let offset = match report.outcome {
            TransferOutcome::Retry(offset) => offset,
            _ => break,
        };
        known_offset = offset;
        observer.on_retry(summary.attempts, offset);

        match policy.next_delay(summary.attempts) {
            Some(delay) => {
                info!(
                    "Client: {:?} attempt {} failed at {} bytes, reconnecting",
                    direction, summary.attempts, offset
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
            None => {
                warn!(
                    "Client: giving up {:?} after {} attempts at {} bytes",
                    direction, summary.attempts, offset
                );
                break;
            }
        }
    }

    observer.on_finish(&summary.outcome);
    summary
}
