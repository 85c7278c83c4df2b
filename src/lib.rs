//! kb-harvester: a scoped, adaptive content harvester
//!
//! This crate crawls blog and documentation sections of unknown structure,
//! escalates fetch strategies per URL when a site pushes back, and normalizes
//! pages and PDF chapters into one canonical item schema for knowledge-base
//! ingestion.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod robots;
pub mod run;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harvester operations
///
/// Only configuration-level and output-write failures surface through this
/// type; per-URL and per-item failures are contained inside the crawler and
/// extractor and show up as fewer items plus log lines.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to write output document to {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration-specific errors
///
/// Fatal for the source they belong to, never for the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Source not found: {0}")]
    MissingSource(String),

    #[error("Cannot read {path}: {reason}")]
    UnreadableFile { path: PathBuf, reason: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Errors produced by a single fetch attempt
///
/// These never abort a crawl. The strategy selector consumes them to decide
/// whether to retry, escalate, or give up on the URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("browser render failed: {0}")]
    Render(String),

    #[error("run cancelled before the next attempt")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else {
            FetchError::Connect(e.to_string())
        }
    }
}

/// Errors produced while turning one page or document into items
///
/// Logged and skipped; never fatal to a run.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no extractable content")]
    EmptyContent,

    #[error("page looks like navigation (link density {0:.2})")]
    NavigationPage(f64),

    #[error("unparseable content: {0}")]
    Unparseable(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use output::{Aggregator, CanonicalItem, ContentType, OutputDocument};
pub use run::RunContext;
pub use state::{HostState, UrlState};
pub use crate::url::{extract_domain, normalize_url, QueryPolicy, Scope};
