//! Progress reporting for export runs
//!
//! Long runs report `(completed, total)` after every batch to a
//! [`ProgressSink`]. Reports are a side effect only; nothing waits on them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Receiver of progress reports
pub trait ProgressSink: Send + Sync {
    fn set_progress(&self, completed: u64, total: u64);

    /// Called once when the run is over
    fn finish(&self) {}
}

/// Progress tracker with an optional terminal progress bar
///
/// Tracks document processing progress and displays a progress bar
/// with speed when enabled.
pub struct ProgressTracker {
    /// Number of documents processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a progress bar
    ///
    /// # Returns
    /// * `Self` - New progress tracker instance
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            bar.set_style(style);
            bar
        });

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Documents reported so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ProgressTracker {
    fn set_progress(&self, completed: u64, total: u64) {
        self.processed.store(completed, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_length(total);
            bar.set_position(completed);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = completed as f64 / elapsed;
                bar.set_message(format!("({:.0} docs/sec)", speed));
            }
        }
    }

    fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
