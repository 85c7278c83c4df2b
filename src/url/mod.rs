//! URL handling module
//!
//! This module provides URL normalization (the frontier key), host extraction,
//! and the crawl scope: the origin plus path prefix a source is locked to.

mod domain;
mod normalize;

use crate::config::validate_scope_prefix;
use crate::ConfigError;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, host_key, origin_of};
pub use normalize::{normalize_url, QueryPolicy};

/// The region of a site a source is allowed to crawl
///
/// A URL is in scope when it shares the seed's origin and its path equals the
/// prefix or continues it at a segment boundary, so `/blog` admits
/// `/blog/post` but not `/blogroll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    origin: String,
    prefix: String,
}

impl Scope {
    /// Creates a scope for the seed's origin with an explicit prefix
    pub fn new(seed: &Url, prefix: &str) -> Self {
        let trimmed = prefix.trim_end_matches('/');
        Self {
            origin: origin_of(seed),
            prefix: if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }

    /// Infers the scope from the seed's first path segment
    ///
    /// ```
    /// use url::Url;
    /// use kb_harvester::url::Scope;
    ///
    /// let seed = Url::parse("https://example.com/blog").unwrap();
    /// assert_eq!(Scope::infer(&seed).prefix(), "/blog");
    /// ```
    pub fn infer(seed: &Url) -> Self {
        let first = seed
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .unwrap_or("");
        Self::new(seed, &format!("/{}", first))
    }

    /// Resolves the scope for a source, validating a configured prefix
    ///
    /// The seed itself must fall inside the resulting scope, otherwise the
    /// source could never produce an item.
    pub fn resolve(seed: &Url, configured: Option<&str>) -> Result<Self, ConfigError> {
        let scope = match configured {
            Some(prefix) => {
                validate_scope_prefix(prefix)?;
                Self::new(seed, prefix)
            }
            None => Self::infer(seed),
        };

        if !scope.contains(seed) {
            return Err(ConfigError::Validation(format!(
                "seed {} lies outside scope prefix '{}'",
                seed, scope.prefix
            )));
        }

        Ok(scope)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns true if the URL is on the scope's origin and under its prefix
    pub fn contains(&self, url: &Url) -> bool {
        origin_of(url) == self.origin && self.contains_path(url.path())
    }

    /// Segment-aware prefix test on a path alone
    pub fn contains_path(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
