use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};

/// Periodic progress lines and a closing summary for long item loops
/// (batch uploads, lookup passes, reorder sweeps).
pub struct ProgressTracker {
    operation: String,
    total: usize,
    done: usize,
    diverted: usize,
    failed: usize,
    skipped: usize,
    start_time: Instant,
    progress_interval: usize,
    last_progress_log: usize,
    error_counts: HashMap<String, usize>,
}

impl ProgressTracker {
    /// `progress_interval`: log every N items (use a smaller value for slow browser loops)
    pub fn new(operation: impl Into<String>, total: usize, progress_interval: usize) -> Self {
        let operation = operation.into();
        if total > 10 {
            info!("{}: {} items to process", operation, total);
        }
        Self {
            operation,
            total,
            done: 0,
            diverted: 0,
            failed: 0,
            skipped: 0,
            start_time: Instant::now(),
            progress_interval: progress_interval.max(1),
            last_progress_log: 0,
            error_counts: HashMap::new(),
        }
    }

    pub fn record_done(&mut self) {
        self.done += 1;
    }

    /// Item sent to a side register (duplicate) instead of being processed
    pub fn record_diverted(&mut self) {
        self.diverted += 1;
    }

    pub fn record_failed(&mut self, error_category: &str) {
        self.failed += 1;
        *self.error_counts.entry(error_category.to_string()).or_insert(0) += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn done(&self) -> usize {
        self.done
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// `current` is 1-based
    pub fn log_progress(&mut self, current: usize) {
        if current.saturating_sub(self.last_progress_log) < self.progress_interval && current != self.total {
            return;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        // cache-only passes finish instantly, no point reporting them
        if elapsed < 0.5 && current < self.total {
            return;
        }
        let rate = if elapsed > 0.0 { current as f64 / elapsed } else { 0.0 };

        info!(
            "{}: {}/{} ({:.1} items/sec) | Done: {} | Diverted: {} | Failed: {} | Skipped: {}",
            self.operation, current, self.total, rate, self.done, self.diverted, self.failed, self.skipped
        );
        self.last_progress_log = current;
    }

    pub fn log_summary(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if self.total == 0 {
            return;
        }

        if self.failed > 0 {
            warn!(
                "{} completed: {} total in {:.1}s | Done: {} | Diverted: {} | Failed: {} | Skipped: {}",
                self.operation, self.total, elapsed, self.done, self.diverted, self.failed, self.skipped
            );

            let mut error_entries: Vec<_> = self.error_counts.iter().collect();
            error_entries.sort_by(|a, b| b.1.cmp(a.1));
            let error_summary: Vec<String> = error_entries
                .iter()
                .map(|(category, count)| format!("{}: {}", category, count))
                .collect();
            info!("Error breakdown: {}", error_summary.join(", "));
        } else {
            info!(
                "{} completed: {} total in {:.1}s | Done: {} | Diverted: {} | Skipped: {}",
                self.operation, self.total, elapsed, self.done, self.diverted, self.skipped
            );
        }
    }
}
