//! Progress tracking for set exports
//!
//! Each worker owns one tracker. When progress display is enabled, trackers
//! draw a spinner line per set under a shared `MultiProgress`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress tracker for one set's export
pub struct ProgressTracker {
    /// Number of records exported so far
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
    /// * `label` - Set being exported, shown as the bar prefix
    /// * `limit` - Record limit if one applies (None for unlimited)
    /// * `multi` - Shared display; `None` disables drawing
    pub fn new(label: &str, limit: Option<u64>, multi: Option<&MultiProgress>) -> Self {
        let bar = multi.map(|multi| {
            let bar = match limit {
                Some(n) => {
                    let bar = ProgressBar::new(n);
                    if let Ok(style) = ProgressStyle::default_bar()
                        .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    {
                        bar.set_style(style.progress_chars("#>-"));
                    }
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    if let Ok(style) =
                        ProgressStyle::default_spinner().template("{spinner:.green} {prefix} {pos} records {msg}")
                    {
                        bar.set_style(style);
                    }
                    bar
                }
            };
            bar.set_prefix(label.to_string());
            multi.add(bar)
        });

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Tracker that never draws.
    pub fn hidden() -> Self {
        Self::new("", None, None)
    }

    /// Update progress with the total exported so far
    pub fn update(&self, count: u64) {
        self.processed.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = count as f64 / elapsed;
                bar.set_message(format!("({:.0} records/sec)", speed));
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
