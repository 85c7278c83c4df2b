//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so the single-site and single-PDF commands run
//! without any configuration file at all.
//!
//! # Example
//!
//! ```no_run
//! use kb_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Concurrency: {}", config.crawler.max_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, PluginConfig, SourceConfig, SourceKind,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_scope_prefix};
