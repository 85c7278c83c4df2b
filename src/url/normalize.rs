use crate::UrlError;
use serde::Deserialize;
use url::Url;

/// Tracking query parameters removed when queries are kept
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "mc_eid", "mc_cid", "ref", "source", "_ga", "_hsenc", "_hsmi",
];

/// How query strings participate in the frontier key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryPolicy {
    /// Queries are dropped entirely; `?page=2` collapses onto the base page
    #[default]
    Drop,
    /// Tracking parameters are removed and the rest sorted by key
    KeepSorted,
}

/// Normalizes a URL into its frontier key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Remove dot segments and duplicate slashes; drop the trailing slash
///    except for the root
/// 4. Remove the fragment
/// 5. Apply the query policy
///
/// The scheme and a `www.` prefix are preserved: they identify distinct
/// origins and the crawl is locked to the seed's origin.
///
/// # Examples
///
/// ```
/// use kb_harvester::url::{normalize_url, QueryPolicy};
///
/// let url = normalize_url("https://EXAMPLE.COM/blog/post/#top", QueryPolicy::Drop).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/blog/post");
/// ```
pub fn normalize_url(url_str: &str, policy: QueryPolicy) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    match policy {
        QueryPolicy::Drop => url.set_query(None),
        QueryPolicy::KeepSorted => {
            if url.query().is_some() {
                let params = filter_and_sort_query_params(&url);
                if params.is_empty() {
                    url.set_query(None);
                } else {
                    url.query_pairs_mut().clear().extend_pairs(params);
                }
            }
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
