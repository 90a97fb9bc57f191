//! Crawler module: the crawl/extract engine
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with referer and cancellation
//! - Selector-driven extraction of links, downloads, titles and print rows
//! - The deduplicated frontier and outstanding-task accounting
//! - Overall crawl coordination across a worker pool

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod progress;

pub use coordinator::{
    Coordinator, RunOptions, DEFAULT_CONCURRENCY, DEFAULT_PROGRESS_INTERVAL, DEFAULT_TIMEOUT,
};
pub use extractor::{extract, CompiledSelectors};
pub use fetcher::{build_http_client, fetch, Body};
pub use frontier::{Frontier, Outstanding, Router, VisitedSet};
pub use progress::ProgressTracker;
