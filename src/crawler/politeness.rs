//! Per-host request spacing
//!
//! Independent of the global fetch slots: many hosts can be crawled in
//! parallel while any single host sees at most one request per spacing
//! interval.

use crate::state::HostState;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Upper bound applied to a robots.txt Crawl-delay
const MAX_CRAWL_DELAY: Duration = Duration::from_secs(30);

/// Shared politeness gate for all hosts in a run
#[derive(Debug)]
pub struct HostLimiter {
    default_spacing: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl HostLimiter {
    pub fn new(default_spacing: Duration) -> Self {
        Self {
            default_spacing,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until this caller may send the next request to `host`
    ///
    /// The slot is reserved under the lock and the sleep happens outside it.
    pub async fn wait_turn(&self, host: &str) {
        let wait = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts
                .entry(host.to_string())
                .or_insert_with(|| HostState::new(self.default_spacing))
                .reserve(Instant::now())
        };

        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before next request to {}", wait, host);
            tokio::time::sleep(wait).await;
        }
    }

    /// Applies a robots.txt Crawl-delay (seconds) to a host
    pub fn apply_crawl_delay(&self, host: &str, seconds: f64) {
        let delay = Duration::try_from_secs_f64(seconds)
            .unwrap_or(MAX_CRAWL_DELAY)
            .min(MAX_CRAWL_DELAY);

        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_string())
            .or_insert_with(|| HostState::new(self.default_spacing))
            .widen_spacing(delay);
        tracing::debug!("Host {} spacing raised to {:?} by Crawl-delay", host, delay);
    }

    /// Number of requests issued to a host so far
    pub fn request_count(&self, host: &str) -> u32 {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).map_or(0, |state| state.request_count)
    }

    pub fn spacing(&self, host: &str) -> Duration {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .get(host)
            .map_or(self.default_spacing, |state| state.spacing)
    }
}
