//! Integration tests for kb-harvester
//!
//! These tests use wiremock to create mock HTTP servers and drive whole runs
//! end-to-end through the public API.

mod common;
mod crawl_tests;
mod fetch_tests;
mod output_tests;
