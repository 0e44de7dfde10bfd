//! Report output.
//!
//! # Submodules
//!
//! - [`json`]: Writes the [`CrawlReport`](crate::models::CrawlReport) to a dated JSON file
//! - [`text`]: Formats analyzed posts as a plain-text summary for stdout

pub mod json;
pub mod text;
