//! Collects items from every source into one output document

use crate::output::item::{CanonicalItem, OutputDocument};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Batches {
    by_source: HashMap<String, Vec<CanonicalItem>>,
    /// Sources not named in the configured order, in first-add order
    extra_sources: Vec<String>,
}

/// Thread-safe item collector
///
/// `add` may be called concurrently from any number of source tasks.
/// `finalize` orders items by configured source order, then by the order
/// each source added them, and collapses duplicates.
#[derive(Debug)]
pub struct Aggregator {
    team_id: String,
    source_order: Vec<String>,
    dedupe_content: bool,
    batches: Mutex<Batches>,
    rejected: AtomicUsize,
    collapsed: AtomicUsize,
}

impl Aggregator {
    pub fn new(team_id: impl Into<String>, source_order: Vec<String>, dedupe_content: bool) -> Self {
        Self {
            team_id: team_id.into(),
            source_order,
            dedupe_content,
            batches: Mutex::new(Batches::default()),
            rejected: AtomicUsize::new(0),
            collapsed: AtomicUsize::new(0),
        }
    }

    /// Adds a source's items; incomplete items are dropped here
    ///
    /// Returns the number of items accepted.
    pub fn add(&self, source_id: &str, items: Vec<CanonicalItem>) -> usize {
        let (complete, incomplete): (Vec<_>, Vec<_>) =
            items.into_iter().partition(CanonicalItem::is_complete);

        for item in &incomplete {
            tracing::warn!(
                "Dropping incomplete item from {} (title: {:?}, url: {:?})",
                source_id,
                item.title,
                item.source_url
            );
        }
        self.rejected.fetch_add(incomplete.len(), Ordering::Relaxed);

        let accepted = complete.len();
        let mut batches = self.batches.lock().unwrap_or_else(|e| e.into_inner());
        if !self.source_order.iter().any(|s| s == source_id)
            && !batches.by_source.contains_key(source_id)
        {
            batches.extra_sources.push(source_id.to_string());
        }
        batches
            .by_source
            .entry(source_id.to_string())
            .or_default()
            .extend(complete);
        accepted
    }

    /// Builds the output document
    pub fn finalize(&self) -> OutputDocument {
        let batches = self.batches.lock().unwrap_or_else(|e| e.into_inner());

        let order = self
            .source_order
            .iter()
            .chain(batches.extra_sources.iter());

        let mut seen_urls = HashSet::new();
        let mut seen_hashes = HashSet::new();
        let mut items = Vec::new();
        let mut collapsed = 0;

        for source in order {
            let Some(batch) = batches.by_source.get(source) else {
                continue;
            };
            for item in batch {
                let first = if item.source_url.is_empty() {
                    !self.dedupe_content || seen_hashes.insert(content_hash(&item.content))
                } else {
                    seen_urls.insert(item.source_url.as_str())
                };

                if first {
                    items.push(item.clone());
                } else {
                    tracing::debug!("Collapsed duplicate item {:?} from {}", item.title, source);
                    collapsed += 1;
                }
            }
        }

        self.collapsed.store(collapsed, Ordering::Relaxed);

        OutputDocument {
            team_id: self.team_id.clone(),
            items,
        }
    }

    /// Items dropped for an empty title or body
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Duplicates removed by the last `finalize`
    pub fn collapsed(&self) -> usize {
        self.collapsed.load(Ordering::Relaxed)
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.trim().as_bytes());
    hex::encode(hasher.finalize())
}
