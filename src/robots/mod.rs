//! Robots.txt handling module
//!
//! Robots.txt is fetched once per source origin at the start of its crawl and
//! consulted before every fetch in that source.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use url::Url;

/// Fetches and parses robots.txt for the origin of `seed`
///
/// A missing file or any fetch failure yields an allow-all policy; robots.txt
/// problems never stop a source from running.
pub async fn fetch_robots(fetcher: &Fetcher, seed: &Url) -> ParsedRobots {
    let robots_url = match seed.join("/robots.txt") {
        Ok(url) => url,
        Err(_) => return ParsedRobots::allow_all(),
    };

    match fetcher.fetch_text(&robots_url).await {
        Ok(Some(body)) => {
            tracing::debug!("Loaded robots.txt from {}", robots_url);
            ParsedRobots::from_content(&body)
        }
        Ok(None) => {
            tracing::debug!("No robots.txt at {}", robots_url);
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}; allowing all", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Checks if a URL is allowed by robots.txt
pub fn is_allowed(robots: &ParsedRobots, url: &Url, user_agent: &str) -> bool {
    robots.is_allowed(url.as_str(), user_agent)
}
