//! Sitemap discovery
//!
//! Seeds the frontier from `Sitemap:` entries in robots.txt, falling back to
//! `/sitemap.xml`. Sitemap indexes are followed one level deep. Every `<loc>`
//! found is handed back to the caller, which offers it to the frontier where
//! scope and dedup filter it like any other link.

use crate::crawler::Fetcher;
use crate::robots::ParsedRobots;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

static LOC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[)?\s*(.*?)\s*(?:\]\]>)?\s*</loc>")
        .expect("hardcoded <loc> pattern is valid")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|amp|lt|gt|quot|apos);")
        .expect("hardcoded entity pattern is valid")
});

/// Child sitemaps followed per index
const MAX_CHILD_SITEMAPS: usize = 50;

/// Page URLs collected per source
const MAX_SITEMAP_URLS: usize = 10_000;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sitemap {
    /// True for `<sitemapindex>` documents whose locs are other sitemaps
    pub is_index: bool,
    pub locs: Vec<String>,
}

/// Parses sitemap XML into its `<loc>` entries
pub fn parse_sitemap(xml: &str) -> Sitemap {
    let locs = LOC
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()))
        .filter(|loc| !loc.is_empty())
        .collect();

    Sitemap {
        is_index: xml.contains("<sitemapindex"),
        locs,
    }
}

/// Decodes the XML predefined entities and numeric character references
///
/// One pass, so `&amp;lt;` becomes `&lt;` and not `<`. Unknown or invalid
/// references are left as written.
pub(crate) fn decode_entities(s: &str) -> String {
    ENTITY
        .replace_all(s, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => name[1..].parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Collects page URLs from the site's sitemaps
///
/// Failures are logged and yield fewer URLs; sitemap problems never stop a
/// source.
pub async fn discover_sitemap_urls(fetcher: &Fetcher, robots: &ParsedRobots, seed: &Url) -> Vec<Url> {
    let mut roots: Vec<Url> = robots
        .sitemaps()
        .iter()
        .filter_map(|s| seed.join(s).ok())
        .collect();
    if roots.is_empty() {
        if let Ok(default) = seed.join("/sitemap.xml") {
            roots.push(default);
        }
    }

    let mut pages = Vec::new();
    for root in roots {
        let Some(sitemap) = load(fetcher, &root).await else {
            continue;
        };

        if sitemap.is_index {
            for child in sitemap.locs.iter().take(MAX_CHILD_SITEMAPS) {
                let Ok(child_url) = root.join(child) else {
                    continue;
                };
                if let Some(child_map) = load(fetcher, &child_url).await {
                    // Nested indexes are not followed further
                    if !child_map.is_index {
                        collect(&child_url, child_map.locs, &mut pages);
                    }
                }
            }
        } else {
            collect(&root, sitemap.locs, &mut pages);
        }

        if pages.len() >= MAX_SITEMAP_URLS {
            pages.truncate(MAX_SITEMAP_URLS);
            break;
        }
    }

    tracing::debug!("Sitemaps for {} listed {} URLs", seed, pages.len());
    pages
}

async fn load(fetcher: &Fetcher, url: &Url) -> Option<Sitemap> {
    match fetcher.fetch_text(url).await {
        Ok(Some(body)) => Some(parse_sitemap(&body)),
        Ok(None) => {
            tracing::debug!("No sitemap at {}", url);
            None
        }
        Err(e) => {
            tracing::warn!("Failed to fetch sitemap {}: {}", url, e);
            None
        }
    }
}

fn collect(base: &Url, locs: Vec<String>, pages: &mut Vec<Url>) {
    pages.extend(locs.iter().filter_map(|loc| base.join(loc).ok()));
}
