//! State module for tracking crawl progress
//!
//! This module provides the records that flow through the crawl engine.
//!
//! # Components
//!
//! - `TaskState`: Tracks the lifecycle of one frontier task (queued, running, skipped, ...)
//! - `PageInfo`: Identity of a page or resource, with a back-link to its parent page
//! - `Task` / `Page`: Frontier work items and the result of extracting one page

mod page;
mod task_state;

// Re-export main types
pub use page::{Page, PageInfo, Task, TaskKind};
pub use task_state::TaskState;
