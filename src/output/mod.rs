//! Output module
//!
//! This module handles:
//! - The canonical item schema and the output document
//! - Aggregating items from concurrent sources with dedup
//! - Writing the document atomically
//! - Recording run statistics

mod aggregator;
mod item;
pub mod stats;
mod writer;

pub use aggregator::Aggregator;
pub use item::{CanonicalItem, ContentType, OutputDocument};
pub use stats::{print_statistics, RunStats, RunSummary};
pub use writer::write_document;
