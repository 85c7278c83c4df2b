//! Feed discovery
//!
//! RSS and Atom feeds list a blog's posts directly, so they are read before
//! the discovery loop starts. Two sources of feeds are used:
//! - Well-known locations under the scope prefix (`feed`, `feed.xml`, ...),
//!   probed in order until one answers with a feed
//! - `<link rel="alternate">` feeds advertised in the seed page's head,
//!   read by the worker that processes the seed
//!
//! Entry links are offered to the frontier like sitemap entries; scope and
//! dedup filter them there.

use crate::crawler::sitemap::decode_entities;
use crate::crawler::Fetcher;
use crate::url::Scope;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:item|entry)\b[^>]*>(.*?)</(?:item|entry)\s*>")
        .expect("hardcoded feed entry pattern is valid")
});
static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b([^>]*)>").expect("hardcoded <link> pattern is valid"));
static LINK_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<link>\s*(?:<!\[CDATA\[)?\s*(.*?)\s*(?:\]\]>)?\s*</link>")
        .expect("hardcoded <link> text pattern is valid")
});
static HREF_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']*)["']"#).expect("hardcoded href pattern is valid")
});
static REL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\brel\s*=\s*["']([^"']*)["']"#).expect("hardcoded rel pattern is valid")
});
static ALTERNATE_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel~='alternate'][href]").expect("hardcoded alternate link selector is valid")
});

/// Well-known feed locations, relative to the scope prefix
const FEED_PATHS: &[&str] = &["feed", "feed.xml", "rss.xml", "index.xml"];

/// Advertised feeds read per seed page
pub const MAX_ADVERTISED_FEEDS: usize = 2;

/// Entry links kept per feed
const MAX_FEED_ENTRIES: usize = 1_000;

/// A parsed RSS or Atom document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Entry links in feed order
    pub links: Vec<String>,
}

/// Parses RSS or Atom XML; `None` when the document is not a feed
pub fn parse_feed(xml: &str) -> Option<Feed> {
    if !(xml.contains("<rss") || xml.contains("<feed") || xml.contains("<rdf:RDF")) {
        return None;
    }

    let links = ENTRY
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .filter_map(|entry| entry_link(entry.as_str()))
        .take(MAX_FEED_ENTRIES)
        .collect();

    Some(Feed { links })
}

/// Atom `<link href>` (alternate or untyped) wins over RSS `<link>text</link>`
fn entry_link(entry: &str) -> Option<String> {
    let atom = LINK_TAG.captures_iter(entry).find_map(|tag| {
        let attrs = tag.get(1)?.as_str();
        let href = HREF_ATTR.captures(attrs)?.get(1)?.as_str();
        let rel = REL_ATTR
            .captures(attrs)
            .and_then(|c| c.get(1))
            .map_or("alternate", |m| m.as_str());
        rel.eq_ignore_ascii_case("alternate").then(|| href.to_string())
    });

    atom.or_else(|| {
        LINK_TEXT
            .captures(entry)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
    .map(|link| decode_entities(link.trim()))
    .filter(|link| !link.is_empty())
}

/// Feed URLs a page advertises with `<link rel="alternate">`
pub fn advertised_feeds(document: &Html, page_url: &Url) -> Vec<Url> {
    let mut feeds: Vec<Url> = Vec::new();
    for link in document.select(&ALTERNATE_LINK) {
        let is_feed = link.value().attr("type").is_some_and(|t| {
            let t = t.to_ascii_lowercase();
            t.contains("rss") || t.contains("atom")
        });
        if !is_feed {
            continue;
        }
        let Some(url) = link.value().attr("href").and_then(|href| page_url.join(href.trim()).ok()) else {
            continue;
        };
        if !feeds.contains(&url) {
            feeds.push(url);
        }
    }
    feeds
}

/// Well-known feed URLs for a scope, most likely first
pub fn feed_candidates(seed: &Url, scope: &Scope) -> Vec<Url> {
    let mut base = seed.clone();
    base.set_path(&format!("{}/", scope.prefix().trim_end_matches('/')));
    base.set_query(None);
    base.set_fragment(None);

    FEED_PATHS.iter().filter_map(|path| base.join(path).ok()).collect()
}

/// Probes the well-known locations and reads the first feed found
///
/// Returns the feed URL with its entry links. Missing or malformed feeds
/// are not errors; the source just starts without feed seeds.
pub async fn probe_feeds(fetcher: &Fetcher, seed: &Url, scope: &Scope) -> Option<(Url, Vec<Url>)> {
    for candidate in feed_candidates(seed, scope) {
        if let Some(entries) = read_feed(fetcher, &candidate).await {
            return Some((candidate, entries));
        }
    }
    tracing::debug!("No feed found under {}{}", scope.origin(), scope.prefix());
    None
}

/// Reads one feed and resolves its entry links
///
/// `None` when the URL is missing or does not hold a feed.
pub async fn read_feed(fetcher: &Fetcher, url: &Url) -> Option<Vec<Url>> {
    let body = match fetcher.fetch_text(url).await {
        Ok(Some(body)) => body,
        Ok(None) => return None,
        Err(e) => {
            tracing::debug!("Failed to fetch feed {}: {}", url, e);
            return None;
        }
    };

    let feed = parse_feed(&body)?;
    let entries: Vec<Url> = feed.links.iter().filter_map(|link| url.join(link).ok()).collect();
    tracing::debug!("Feed {} lists {} entries", url, entries.len());
    Some(entries)
}
