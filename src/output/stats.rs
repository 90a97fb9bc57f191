//! Run statistics
//!
//! Workers tally every terminal task transition here; the coordinator turns
//! the tallies into a [`CrawlSummary`] when the run ends.

use crate::state::{TaskKind, TaskState};
use std::sync::atomic::{AtomicU64, Ordering};

/// Summary of a finished crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages fetched and extracted
    pub pages_fetched: u64,

    /// Pages whose fetch, parse or print failed
    pub pages_failed: u64,

    /// Downloads handed to the sink and persisted
    pub downloads_completed: u64,

    /// Downloads the sink declined to fetch
    pub downloads_declined: u64,

    /// Downloads whose fetch or persist failed
    pub downloads_failed: u64,

    /// Tasks dropped because their URL was already visited
    pub duplicates_skipped: u64,

    /// Distinct URLs claimed during the run
    pub visited: u64,
}

impl CrawlSummary {
    /// Creates a new empty crawl summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of tasks that reached a terminal state
    pub fn total_tasks(&self) -> u64 {
        self.pages_fetched
            + self.pages_failed
            + self.downloads_completed
            + self.downloads_declined
            + self.downloads_failed
            + self.duplicates_skipped
    }

    /// Total number of failed tasks
    pub fn total_errors(&self) -> u64 {
        self.pages_failed + self.downloads_failed
    }
}

/// Lock-free counters updated by workers during a run
#[derive(Debug, Default)]
pub struct RunStats {
    pages_fetched: AtomicU64,
    pages_failed: AtomicU64,
    downloads_completed: AtomicU64,
    downloads_declined: AtomicU64,
    downloads_failed: AtomicU64,
    duplicates_skipped: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tallies a task that moved from `from` into the terminal state `to`
    ///
    /// A skip straight out of `Queued` is a duplicate URL; a skip after the
    /// task started running is a declined download.
    pub fn record(&self, kind: TaskKind, from: TaskState, to: TaskState) {
        let counter = match (kind, from, to) {
            (_, TaskState::Queued, TaskState::Skipped) => &self.duplicates_skipped,
            (TaskKind::Page, _, TaskState::Succeeded) => &self.pages_fetched,
            (TaskKind::Page, _, _) => &self.pages_failed,
            (TaskKind::Download, _, TaskState::Succeeded) => &self.downloads_completed,
            (TaskKind::Download, _, TaskState::Skipped) => &self.downloads_declined,
            (TaskKind::Download, _, _) => &self.downloads_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters
    pub fn summary(&self, visited: u64) -> CrawlSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CrawlSummary {
            pages_fetched: load(&self.pages_fetched),
            pages_failed: load(&self.pages_failed),
            downloads_completed: load(&self.downloads_completed),
            downloads_declined: load(&self.downloads_declined),
            downloads_failed: load(&self.downloads_failed),
            duplicates_skipped: load(&self.duplicates_skipped),
            visited,
        }
    }
}
