//! Crawl frontier
//!
//! Holds the discovered-but-unprocessed URLs of one source plus the state of
//! every URL ever admitted. Admission (scope check, depth bound, dedup) and
//! popping happen under a single lock, so two workers offering the same link
//! concurrently produce exactly one admission, and an admitted URL is handed
//! to exactly one worker.
//!
//! Ordering is FIFO: shallow pages are processed before deep ones, which is
//! what a page or time budget should cut off.

use crate::state::UrlState;
use crate::url::{normalize_url, QueryPolicy, Scope};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

/// A URL waiting in (or popped from) the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized absolute URL; its string form is the dedup key
    pub url: Url,
    pub depth: u32,
    pub discovered_from: Option<Url>,
    /// Admission order, used to keep output in discovery order
    pub seq: u64,
}

/// Bounds applied by the frontier
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontierLimits {
    pub max_depth: Option<u32>,
    /// Page budget: total pops allowed
    pub max_pages: Option<u32>,
    pub query_policy: QueryPolicy,
}

/// Snapshot of URL states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub pending: usize,
    pub fetching: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct Inner {
    scope: Option<Scope>,
    queue: VecDeque<FrontierEntry>,
    states: HashMap<String, UrlState>,
    popped: u32,
    in_flight: usize,
    closed: bool,
    next_seq: u64,
}

enum Pop {
    Entry(FrontierEntry),
    Wait,
    Done,
}

/// Thread-safe FIFO frontier for one source
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    limits: FrontierLimits,
}

impl Frontier {
    /// Creates an empty frontier; nothing is admitted until it is seeded
    pub fn new(limits: FrontierLimits) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            limits,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the scope and admits the seed URLs at depth 0
    ///
    /// Returns the number of seeds admitted.
    pub fn seed(&self, urls: &[Url], scope: Scope) -> usize {
        self.lock().scope = Some(scope);
        urls.iter()
            .filter(|url| self.offer(url, 0, None))
            .count()
    }

    /// Offers a discovered URL
    ///
    /// Returns true if the URL was newly admitted. Off-scope, too deep,
    /// unparseable, and already-seen URLs are silently ignored.
    pub fn offer(&self, url: &Url, depth: u32, discovered_from: Option<&Url>) -> bool {
        let Ok(normalized) = normalize_url(url.as_str(), self.limits.query_policy) else {
            return false;
        };

        if self.limits.max_depth.is_some_and(|max| depth > max) {
            tracing::trace!("Depth {} exceeds bound for {}", depth, normalized);
            return false;
        }

        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        match &inner.scope {
            Some(scope) if scope.contains(&normalized) => {}
            _ => {
                tracing::trace!("Off-scope: {}", normalized);
                return false;
            }
        }

        let key = normalized.to_string();
        if inner.states.contains_key(&key) {
            return false;
        }

        inner.states.insert(key, UrlState::Pending);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.push_back(FrontierEntry {
            url: normalized,
            depth,
            discovered_from: discovered_from.cloned(),
            seq,
        });
        drop(inner);

        tracing::trace!("Admitted {} at depth {}", url, depth);
        self.notify.notify_waiters();
        true
    }

    /// Pops the next entry without waiting
    ///
    /// Returns None when the queue is momentarily empty, the budget is spent,
    /// or the frontier is closed.
    pub fn pop_next(&self) -> Option<FrontierEntry> {
        match self.lock().try_pop(&self.limits) {
            Pop::Entry(entry) => Some(entry),
            Pop::Wait | Pop::Done => None,
        }
    }

    /// Waits for the next entry
    ///
    /// Returns None once the crawl is over: the queue is empty with nothing
    /// in flight that could add to it, the page budget is spent, or the
    /// frontier was closed.
    pub async fn next_entry(&self) -> Option<FrontierEntry> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            {
                let mut inner = self.lock();
                match inner.try_pop(&self.limits) {
                    Pop::Entry(entry) => return Some(entry),
                    Pop::Done => return None,
                    Pop::Wait => {}
                }
                // Registered while the lock is held, so a state change made
                // after this check is guaranteed to wake us
                notified.as_mut().enable();
            }

            notified.await;
        }
    }

    /// Records the terminal state of a popped entry
    pub fn complete(&self, entry: &FrontierEntry, state: UrlState) {
        {
            let mut inner = self.lock();
            inner.states.insert(entry.url.to_string(), state);
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Claims a redirect target for the page currently being processed
    ///
    /// Returns false if the target was already admitted or claimed, in which
    /// case the page is a duplicate of one handled elsewhere.
    pub fn claim(&self, url: &Url) -> bool {
        let Ok(normalized) = normalize_url(url.as_str(), self.limits.query_policy) else {
            return false;
        };
        let mut inner = self.lock();
        let key = normalized.to_string();
        if inner.states.contains_key(&key) {
            return false;
        }
        inner.states.insert(key, UrlState::Processed);
        true
    }

    /// Stops handing out entries; in-flight work is unaffected
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Number of entries popped so far
    pub fn popped(&self) -> u32 {
        self.lock().popped
    }

    pub fn state_of(&self, url: &Url) -> Option<UrlState> {
        let normalized = normalize_url(url.as_str(), self.limits.query_policy).ok()?;
        self.lock().states.get(normalized.as_str()).copied()
    }

    pub fn counts(&self) -> FrontierCounts {
        let inner = self.lock();
        let mut counts = FrontierCounts::default();
        for state in inner.states.values() {
            match state {
                UrlState::Pending => counts.pending += 1,
                UrlState::Fetching => counts.fetching += 1,
                UrlState::Processed => counts.processed += 1,
                UrlState::Failed => counts.failed += 1,
                UrlState::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}

impl Inner {
    fn try_pop(&mut self, limits: &FrontierLimits) -> Pop {
        if self.closed {
            return Pop::Done;
        }
        if limits.max_pages.is_some_and(|max| self.popped >= max) {
            return Pop::Done;
        }

        match self.queue.pop_front() {
            Some(entry) => {
                self.states
                    .insert(entry.url.to_string(), UrlState::Fetching);
                self.popped += 1;
                self.in_flight += 1;
                Pop::Entry(entry)
            }
            None if self.in_flight == 0 => Pop::Done,
            None => Pop::Wait,
        }
    }
}
