// Progress reporting hooks for client transfers

use indicatif::{ProgressBar, ProgressStyle};
use crate::common::types::{TransferDirection, TransferOutcome};

/// Receives progress events from the resume controller and its attempts.
/// Every method has a no-op default so implementors pick what they need.
pub trait TransferObserver: Send + Sync {
    /// A new connection attempt is starting (1-based).
    fn on_attempt(&self, _attempt: u32, _direction: TransferDirection) {}

    /// Offset negotiated for this attempt, and the total transfer size.
    fn on_resume(&self, _offset: u64, _total: u64) {}

    /// One chunk of `len` bytes moved; `transferred` is the running position
    /// within the file.
    fn on_chunk(&self, _len: usize, _transferred: u64, _total: u64) {}

    /// The attempt ended in a recoverable fault at `offset`.
    fn on_retry(&self, _attempt: u32, _offset: u64) {}

    fn on_finish(&self, _outcome: &TransferOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Terminal progress bar driven by transfer events.
pub struct ProgressBarObserver {
    bar: ProgressBar,
    label: String,
}

impl ProgressBarObserver {
    pub fn new(label: impl Into<String>) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        let label = label.into();
        bar.set_message(label.clone());
        Self { bar, label }
    }
}

impl TransferObserver for ProgressBarObserver {
    fn on_attempt(&self, attempt: u32, _direction: TransferDirection) {
        if attempt > 1 {
            self.bar
                .set_message(format!("{} (attempt {})", self.label, attempt));
        }
    }

    fn on_resume(&self, offset: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(offset);
    }

    fn on_chunk(&self, _len: usize, transferred: u64, _total: u64) {
        self.bar.set_position(transferred);
    }

    fn on_retry(&self, _attempt: u32, offset: u64) {
        self.bar.set_message(format!("{} (reconnecting at {} bytes)", self.label, offset));
    }

    fn on_finish(&self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Completed => self.bar.finish_with_message(format!("{} complete", self.label)),
            TransferOutcome::Rejected(reason) => {
                self.bar.abandon_with_message(format!("{} rejected: {}", self.label, reason))
            }
            TransferOutcome::Retry(offset) => self.bar.abandon_with_message(format!(
                "{} gave up at {} bytes",
                self.label, offset
            )),
        }
    }
}
