//! Crawler module for discovering and fetching pages of one source
//!
//! This module contains the core crawling logic, including:
//! - The scoped, deduplicating frontier
//! - Per-URL fetch strategy escalation and the fetcher executing it
//! - Per-host politeness spacing
//! - Link, feed and sitemap discovery
//! - Per-source crawl coordination

mod coordinator;
mod feed;
mod fetcher;
mod frontier;
mod parser;
mod politeness;
mod render;
mod sitemap;
mod strategy;

pub use coordinator::Coordinator;
pub use feed::{advertised_feeds, feed_candidates, parse_feed, probe_feeds, read_feed, Feed};
pub use fetcher::{build_http_client, random_user_agent, FetchOutcome, Fetcher};
pub use frontier::{Frontier, FrontierCounts, FrontierEntry, FrontierLimits};
pub use parser::{extract_links, extract_links_from_html, resolve_link};
pub use politeness::HostLimiter;
#[cfg(feature = "browser")]
pub use render::ChromiumRenderer;
pub use render::PageRenderer;
pub use sitemap::{discover_sitemap_urls, parse_sitemap, Sitemap};
pub use strategy::{
    classify_response, BlockReason, Decision, FetchAttempt, FetchStatus, FetchedPage, RetryPolicy,
    Strategy, StrategySelector,
};
