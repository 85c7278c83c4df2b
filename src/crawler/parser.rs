//! Link extraction from fetched HTML
//!
//! Links are resolved against the page URL (or its `<base href>`), filtered
//! to HTTP(S) pages, and deduplicated per page in document order. Scope and
//! cross-page dedup are the frontier's job.

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("hardcoded selector 'a[href]' is valid"));
static CANONICAL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel='canonical'][href]").expect("hardcoded canonical selector is valid")
});
static BASE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("hardcoded selector 'base[href]' is valid"));

/// File extensions that never hold a crawlable page
const ASSET_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".json", ".xml",
    ".zip", ".gz", ".tar", ".mp3", ".mp4", ".webm", ".woff", ".woff2", ".ttf", ".pdf", ".rss",
    ".atom",
];

/// Extracts outbound page links from a parsed document
///
/// # Include
///
/// - `<a href>` anywhere in the document, including nav and footer
/// - `<link rel="canonical">`
///
/// # Exclude
///
/// - `<a download>`
/// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links
/// - Non-HTTP(S) URLs after resolution
/// - Links to static assets (images, stylesheets, archives, feeds)
pub fn extract_links(document: &Html, page_url: &Url) -> Vec<Url> {
    let base = document
        .select(&BASE)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone());

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let anchors = document
        .select(&ANCHOR)
        .filter(|el| el.value().attr("download").is_none());
    let canonical = document.select(&CANONICAL);

    for element in anchors.chain(canonical) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(mut url) = resolve_link(href, &base) {
            url.set_fragment(None);
            if seen.insert(url.to_string()) {
                links.push(url);
            }
        }
    }

    links
}

/// Convenience wrapper parsing raw HTML first
pub fn extract_links_from_html(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    extract_links(&document, page_url)
}

/// Resolves a link href to an absolute page URL
///
/// Returns None if the link should be excluded.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    if is_asset_path(url.path()) {
        return None;
    }

    Some(url)
}

fn is_asset_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
