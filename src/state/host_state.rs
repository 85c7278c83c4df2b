use std::time::{Duration, Instant};

/// Tracks request spacing for a single host
///
/// Workers reserve the next free slot under a lock and sleep outside it, so
/// concurrent workers targeting one host queue up behind each other instead
/// of all waking at the same instant.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Minimum time between two requests to this host
    pub spacing: Duration,

    /// Earliest instant the next request may start
    next_slot: Option<Instant>,

    /// Number of requests issued to this host in the current run
    pub request_count: u32,
}

impl HostState {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: None,
            request_count: 0,
        }
    }

    /// Reserves the next request slot and returns how long to wait for it
    pub fn reserve(&mut self, now: Instant) -> Duration {
        let start = match self.next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        self.next_slot = Some(start + self.spacing);
        self.request_count += 1;
        start - now
    }

    /// Raises the spacing, e.g. to honor a robots.txt Crawl-delay
    ///
    /// Never lowers it below the configured politeness delay.
    pub fn widen_spacing(&mut self, spacing: Duration) {
        self.spacing = self.spacing.max(spacing);
    }

    /// Time until a request could start without waiting
    pub fn time_until_next_request(&self, now: Instant) -> Duration {
        match self.next_slot {
            Some(slot) if slot > now => slot - now,
            _ => Duration::ZERO,
        }
    }
}
