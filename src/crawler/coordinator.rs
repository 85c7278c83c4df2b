//! Crawl coordinator - per-source crawl orchestration
//!
//! One coordinator drives one web source:
//! - Loading robots.txt and applying its crawl delay
//! - Seeding the frontier from the origin and, when crawling, from feeds
//!   and sitemaps
//! - Running a pool of workers that pop, fetch, extract, and offer links
//! - Stopping on cancellation or when the time budget runs out: the frontier
//!   closes and no fetch chain starts another attempt
//!
//! Single-document sources (`crawl = false`) take the same path with a
//! depth bound of zero, so only the origin itself is fetched.

use crate::config::SourceConfig;
use crate::crawler::feed::{advertised_feeds, probe_feeds, read_feed, MAX_ADVERTISED_FEEDS};
use crate::crawler::frontier::{Frontier, FrontierEntry, FrontierLimits};
use crate::crawler::parser::extract_links;
use crate::crawler::sitemap::discover_sitemap_urls;
use crate::output::CanonicalItem;
use crate::robots::{fetch_robots, is_allowed, ParsedRobots};
use crate::run::RunContext;
use crate::state::UrlState;
use crate::url::{host_key, normalize_url, Scope};
use crate::{ConfigError, ExtractionError, FetchError};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// An extracted item tagged with where it was found, for ordering
type Found = (u64, usize, CanonicalItem);

/// Crawl coordinator for one web source
pub struct Coordinator {
    ctx: RunContext,
    source: Arc<SourceConfig>,
    seed: Url,
    scope: Scope,
    frontier: Arc<Frontier>,
}

impl Coordinator {
    /// Creates a coordinator for a web source
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidUrl` - The origin is not an absolute HTTP(S) URL
    /// * `ConfigError::Validation` - The scope prefix is malformed or does not
    ///   contain the origin
    pub fn new(ctx: RunContext, source: SourceConfig) -> Result<Self, ConfigError> {
        let seed = Url::parse(source.origin.trim())
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", source.origin, e)))?;
        if !matches!(seed.scheme(), "http" | "https") || seed.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: expected an http(s) URL",
                source.origin
            )));
        }

        let scope = Scope::resolve(&seed, source.scope_prefix.as_deref())?;

        let crawler = &ctx.config.crawler;
        let limits = FrontierLimits {
            max_depth: if source.crawl { crawler.max_depth } else { Some(0) },
            max_pages: crawler.max_pages,
            query_policy: crawler.query_policy,
        };

        Ok(Self {
            frontier: Arc::new(Frontier::new(limits)),
            source: Arc::new(source),
            ctx,
            seed,
            scope,
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Crawls the source to completion and returns its items in discovery
    /// order
    pub async fn run(self) -> Vec<CanonicalItem> {
        let name = self.source.name.clone();
        let config = &self.ctx.config;
        let fetcher = &self.ctx.fetcher;
        tracing::info!(
            "Starting source '{}' at {} (scope {})",
            name,
            self.seed,
            self.scope.prefix()
        );

        let robots = if config.crawler.respect_robots {
            fetch_robots(fetcher, &self.seed).await
        } else {
            ParsedRobots::allow_all()
        };
        if let (Some(delay), Some(host)) = (robots.crawl_delay(fetcher.user_agent()), host_key(&self.seed)) {
            tracing::debug!("Crawl-delay {}s for {}", delay, host);
            fetcher.limiter().apply_crawl_delay(&host, delay);
        }

        self.frontier.seed(&[self.seed.clone()], self.scope.clone());

        let mut probed_feed = None;
        if self.source.crawl && config.crawler.use_feeds {
            if let Some((feed, entries)) = probe_feeds(fetcher, &self.seed, &self.scope).await {
                let admitted = entries
                    .iter()
                    .filter(|url| self.frontier.offer(url, 1, None))
                    .count();
                tracing::info!("Feed {} added {} URLs to '{}'", feed, admitted, name);
                probed_feed = Some(feed);
            }
        }

        if self.source.crawl && config.crawler.use_sitemaps {
            let listed = discover_sitemap_urls(fetcher, &robots, &self.seed).await;
            let admitted = listed
                .iter()
                .filter(|url| self.frontier.offer(url, 1, None))
                .count();
            if admitted > 0 {
                tracing::info!("Sitemaps added {} URLs to '{}'", admitted, name);
            }
        }

        // Fires on run cancellation or when this source's time budget expires
        let stop = self.ctx.cancel.child_token();
        let done = CancellationToken::new();
        let closer = tokio::spawn(close_when_over(
            self.frontier.clone(),
            stop.clone(),
            done.clone(),
            config.crawler.max_duration_secs.map(Duration::from_secs),
        ));

        let robots = Arc::new(robots);
        let mut workers = JoinSet::new();
        for _ in 0..config.crawler.max_concurrency.max(1) {
            let worker = Worker {
                ctx: self.ctx.clone(),
                source: self.source.clone(),
                frontier: self.frontier.clone(),
                robots: robots.clone(),
                scope: self.scope.clone(),
                stop: stop.clone(),
                probed_feed: probed_feed.clone(),
            };
            workers.spawn(worker.run());
        }

        let mut found: Vec<Found> = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(items) => found.extend(items),
                Err(e) => {
                    tracing::error!("Worker for '{}' failed: {}", name, e);
                    // An entry the worker held never completes; stop waiting on it
                    self.frontier.close();
                }
            }
        }

        done.cancel();
        let _ = closer.await;

        found.sort_by_key(|(seq, index, _)| (*seq, *index));
        let counts = self.frontier.counts();
        tracing::info!(
            "Finished source '{}': {} items, {} processed, {} failed, {} skipped",
            name,
            found.len(),
            counts.processed,
            counts.failed,
            counts.skipped
        );

        found.into_iter().map(|(_, _, item)| item).collect()
    }
}

/// Closes the frontier on cancellation or when the time budget expires
///
/// An expired budget also cancels `stop`, so fetch chains still retrying
/// give up instead of sending more requests.
async fn close_when_over(
    frontier: Arc<Frontier>,
    stop: CancellationToken,
    done: CancellationToken,
    budget: Option<Duration>,
) {
    let expired = async {
        match budget {
            Some(budget) => tokio::time::sleep(budget).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = done.cancelled() => {}
        _ = stop.cancelled() => {
            tracing::info!("Cancellation requested, finishing in-flight pages");
            frontier.close();
        }
        _ = expired => {
            tracing::info!("Time budget reached, finishing in-flight pages");
            stop.cancel();
            frontier.close();
        }
    }
}

struct Worker {
    ctx: RunContext,
    source: Arc<SourceConfig>,
    frontier: Arc<Frontier>,
    robots: Arc<ParsedRobots>,
    scope: Scope,
    /// Cancelled when the source must stop fetching
    stop: CancellationToken,
    /// Feed already read before the loop
    probed_feed: Option<Url>,
}

impl Worker {
    async fn run(self) -> Vec<Found> {
        let mut found = Vec::new();
        while let Some(entry) = self.frontier.next_entry().await {
            let state = self.process(&entry, &mut found).await;
            self.frontier.complete(&entry, state);
        }
        found
    }

    /// Fetches one entry, extracts its items, and offers its links
    async fn process(&self, entry: &FrontierEntry, found: &mut Vec<Found>) -> UrlState {
        let fetcher = &self.ctx.fetcher;
        let stats = &self.ctx.stats;

        if !is_allowed(&self.robots, &entry.url, fetcher.user_agent()) {
            tracing::debug!("Disallowed by robots.txt: {}", entry.url);
            stats.record_skip();
            return UrlState::Skipped;
        }

        let outcome = {
            let slot = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return UrlState::Skipped,
                slot = self.ctx.fetch_slots.acquire() => slot,
            };
            let Ok(_slot) = slot else {
                return UrlState::Skipped;
            };
            fetcher.fetch_adaptive(&entry.url, &self.stop).await
        };
        stats.record_attempts(outcome.attempts.len() as u64, u64::from(outcome.escalations));

        let page = match outcome.result {
            Ok(page) => page,
            Err(FetchError::Cancelled) => {
                tracing::debug!("Stopped before fetching {}", entry.url);
                return UrlState::Skipped;
            }
            Err(e) => {
                tracing::warn!(
                    "Giving up on {} after {} attempts: {}",
                    entry.url,
                    outcome.attempts.len(),
                    e
                );
                stats.record_failure();
                return UrlState::Failed;
            }
        };

        let query_policy = self.ctx.config.crawler.query_policy;
        let page_url = normalize_url(page.final_url.as_str(), query_policy)
            .unwrap_or_else(|_| page.final_url.clone());
        if page_url != entry.url {
            if !self.scope.contains(&page_url) {
                tracing::debug!("Redirected off-scope: {} -> {}", entry.url, page_url);
                stats.record_skip();
                return UrlState::Skipped;
            }
            if !self.frontier.claim(&page_url) {
                tracing::debug!("Redirect target already seen: {} -> {}", entry.url, page_url);
                stats.record_skip();
                return UrlState::Skipped;
            }
        }

        let read_feeds = self.source.crawl && entry.depth == 0 && self.ctx.config.crawler.use_feeds;

        // Html is not Send; it must be gone before the next await
        let (links, feeds, extracted) = {
            let document = Html::parse_document(&page.body);
            let links = if self.source.crawl {
                extract_links(&document, &page.final_url)
            } else {
                Vec::new()
            };
            let feeds = if read_feeds {
                advertised_feeds(&document, &page.final_url)
            } else {
                Vec::new()
            };
            let extracted = self
                .ctx
                .extractor
                .extract_page(&self.source, &page_url, &document);
            (links, feeds, extracted)
        };

        for link in &links {
            self.frontier.offer(link, entry.depth + 1, Some(&page_url));
        }

        for feed in feeds
            .iter()
            .filter(|feed| self.probed_feed.as_ref() != Some(*feed))
            .take(MAX_ADVERTISED_FEEDS)
        {
            if let Some(entries) = read_feed(fetcher, feed).await {
                let admitted = entries
                    .iter()
                    .filter(|url| self.frontier.offer(url, entry.depth + 1, Some(&page_url)))
                    .count();
                tracing::debug!("Advertised feed {} added {} URLs", feed, admitted);
            }
        }

        match extracted {
            Ok(items) => {
                found.extend(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| (entry.seq, index, item)),
                );
            }
            Err(e @ (ExtractionError::NavigationPage(_) | ExtractionError::EmptyContent)) => {
                tracing::debug!("No content on {}: {}", page_url, e);
            }
            Err(e) => {
                tracing::warn!("Extraction failed for {}: {}", page_url, e);
                stats.record_dropped(1);
            }
        }

        let fetched = stats.record_page();
        if fetched % 10 == 0 {
            tracing::info!(
                "Progress: {} pages fetched, {} pending in '{}'",
                fetched,
                self.frontier.counts().pending,
                self.source.name
            );
        }

        UrlState::Processed
    }
}
