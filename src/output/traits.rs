//! Sink traits the crawl engine reports into
//!
//! The engine never writes files or terminal output itself. Downloads, print
//! rows and progress ticks are handed to implementations of these traits.

use crate::crawler::Body;
use crate::state::PageInfo;
use crate::{SinkError, WebdlError};
use async_trait::async_trait;

/// Receives resources matched by the download selectors
///
/// Implementations must be thread-safe: workers call them concurrently.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Decides whether a discovered resource should be fetched at all
    ///
    /// # Arguments
    ///
    /// * `info` - The resource, with its parent page as referer
    async fn should_download(&self, info: &PageInfo) -> bool;

    /// Persists a fetched resource
    ///
    /// # Arguments
    ///
    /// * `info` - The resource being persisted
    /// * `body` - The unread response body
    ///
    /// Returning [`SinkError::Fatal`] stops the whole run; any other error
    /// only fails this download.
    async fn persist(&self, info: &PageInfo, body: Body) -> Result<(), SinkError>;
}

/// Receives the print table extracted from each page
pub trait PrintSink: Send + Sync {
    /// Handles one page's rows; only called when the page produced rows
    ///
    /// Returning [`SinkError::Fatal`] stops the whole run.
    fn print(&self, info: &PageInfo, rows: &[Vec<String>]) -> Result<(), SinkError>;
}

/// Receives progress ticks
pub trait ProgressSink: Send + Sync {
    /// Reports progress after a task finished
    ///
    /// # Arguments
    ///
    /// * `error` - The task's error, if it failed
    /// * `completed` - Tasks finished so far
    /// * `total` - Tasks discovered so far
    fn report(&self, error: Option<&WebdlError>, completed: u64, total: u64);
}
