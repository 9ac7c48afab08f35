#![forbid(unsafe_code)]

//! Public entry point for the trending-videos pipeline.
//!
//! The crate fetches the platform's most-popular chart for a list of regions,
//! stores it as a flat file, and turns the file back into a typed, enriched
//! table plus the summaries the dashboard charts are drawn from. The
//! re-exports below are the operations a presentation layer calls, in order.

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod preprocess;
pub mod record;
pub mod stats;
pub mod storage;

pub use error::{PipelineError, Result};
pub use fetcher::{CategoryMap, fetch_trending, fetch_trending_regional, resolve_category_mapping};
pub use preprocess::{
    RowErrorPolicy, derive_duration_fields, derive_publish_hour, derive_tag_count, enrich,
    preprocess,
};
pub use record::{VideoRecord, VideoTable};
pub use stats::{SummaryTable, descriptive_stats};
pub use storage::{RawTable, load, persist};
