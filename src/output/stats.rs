//! Run statistics
//!
//! Counters are updated concurrently by workers and read once at the end of
//! the run for the summary.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one run
#[derive(Debug)]
pub struct RunStats {
    started_at: DateTime<Utc>,
    pages_fetched: AtomicU64,
    pages_failed: AtomicU64,
    pages_skipped: AtomicU64,
    fetch_attempts: AtomicU64,
    escalations: AtomicU64,
    items_emitted: AtomicU64,
    items_dropped: AtomicU64,
    sources_completed: AtomicU64,
    sources_failed: AtomicU64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            pages_fetched: AtomicU64::new(0),
            pages_failed: AtomicU64::new(0),
            pages_skipped: AtomicU64::new(0),
            fetch_attempts: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            items_emitted: AtomicU64::new(0),
            items_dropped: AtomicU64::new(0),
            sources_completed: AtomicU64::new(0),
            sources_failed: AtomicU64::new(0),
        }
    }

    /// Records a fetched page; returns the running total
    pub fn record_page(&self) -> u64 {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_failure(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempts(&self, attempts: u64, escalations: u64) {
        self.fetch_attempts.fetch_add(attempts, Ordering::Relaxed);
        self.escalations.fetch_add(escalations, Ordering::Relaxed);
    }

    pub fn record_items(&self, emitted: u64) {
        self.items_emitted.fetch_add(emitted, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, dropped: u64) {
        self.items_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn record_source(&self, succeeded: bool) {
        if succeeded {
            self.sources_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.sources_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn escalations(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }

    pub fn pages_failed(&self) -> u64 {
        self.pages_failed.load(Ordering::Relaxed)
    }

    /// Freezes the counters into a summary
    ///
    /// `duplicates_collapsed` comes from the aggregator, which only knows it
    /// after finalizing.
    pub fn summary(&self, duplicates_collapsed: u64) -> RunSummary {
        let finished_at = Utc::now();
        RunSummary {
            started_at: self.started_at,
            finished_at,
            duration_seconds: (finished_at - self.started_at).num_milliseconds().max(0) as f64
                / 1000.0,
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            pages_skipped: self.pages_skipped.load(Ordering::Relaxed),
            fetch_attempts: self.fetch_attempts.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            items_emitted: self.items_emitted.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            duplicates_collapsed,
            sources_completed: self.sources_completed.load(Ordering::Relaxed),
            sources_failed: self.sources_failed.load(Ordering::Relaxed),
        }
    }
}

/// Final statistics for a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub pages_fetched: u64,
    pub pages_failed: u64,
    pub pages_skipped: u64,
    pub fetch_attempts: u64,
    pub escalations: u64,
    pub items_emitted: u64,
    pub items_dropped: u64,
    pub duplicates_collapsed: u64,
    pub sources_completed: u64,
    pub sources_failed: u64,
}

impl RunSummary {
    /// Share of attempted pages that were fetched, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.pages_fetched + self.pages_failed;
        if attempted == 0 {
            0.0
        } else {
            self.pages_fetched as f64 / attempted as f64 * 100.0
        }
    }
}

/// Prints run statistics to stdout
pub fn print_statistics(summary: &RunSummary) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Started: {}", summary.started_at.to_rfc3339());
    println!("  Duration: {:.1}s", summary.duration_seconds);
    println!(
        "  Sources: {} completed, {} failed",
        summary.sources_completed, summary.sources_failed
    );
    println!();

    println!("Fetching:");
    println!("  Pages fetched: {}", summary.pages_fetched);
    println!("  Pages failed: {}", summary.pages_failed);
    println!("  Pages skipped: {}", summary.pages_skipped);
    println!("  Attempts: {}", summary.fetch_attempts);
    println!("  Strategy escalations: {}", summary.escalations);
    println!();

    println!("Items:");
    println!("  Emitted: {}", summary.items_emitted);
    println!("  Dropped: {}", summary.items_dropped);
    println!("  Duplicates collapsed: {}", summary.duplicates_collapsed);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} pages fetched)",
        summary.success_rate(),
        summary.pages_fetched,
        summary.pages_fetched + summary.pages_failed
    );
}
