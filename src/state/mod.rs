//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlState`: lifecycle of one normalized URL inside a source's frontier
//! - `HostState`: per-host request spacing used for politeness

mod host_state;
mod url_state;

pub use host_state::HostState;
pub use url_state::UrlState;
