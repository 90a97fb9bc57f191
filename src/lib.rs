//! webdl: a selector-driven recursive web downloader
//!
//! This crate crawls a set of seed pages, follows links matched by CSS
//! selectors, extracts titles and tabular print data, and hands matched
//! resources to a download sink. The engine lives in [`crawler`]; the
//! binary wires it to files on disk and to the terminal.

pub mod config;
pub mod crawler;
pub mod output;
pub mod selector;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for webdl operations
#[derive(Debug, Error)]
pub enum WebdlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed URL '{url}': {source}")]
    InvalidSeed {
        url: String,
        source: ::url::ParseError,
    },

    #[error("Invalid selector '{query}': {message}")]
    InvalidSelector { query: String, message: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Timed out after {after:?} waiting for {url}")]
    Timeout {
        url: String,
        after: std::time::Duration,
    },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Sink error for {url}: {source}")]
    Sink { url: String, source: SinkError },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TaskState,
        to: state::TaskState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl worker failed: {0}")]
    Worker(String),

    #[error("Crawl cancelled")]
    Cancelled,
}

impl WebdlError {
    /// Returns true if this error is a consequence of run cancellation
    /// rather than a failure of the task itself.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Sink { source, .. } => matches!(source, SinkError::Cancelled),
            _ => false,
        }
    }

    /// Returns true if this error must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Sink { source, .. } => source.is_fatal(),
            Self::Cancelled | Self::Config(_) | Self::InvalidSeed { .. } => true,
            Self::InvalidSelector { .. } | Self::Client(_) | Self::Worker(_) => true,
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to resolve '{href}': {source}")]
    Parse {
        href: String,
        source: ::url::ParseError,
    },
}

/// Errors raised by download, print and progress sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read response body: {0}")]
    Body(#[from] reqwest::Error),

    #[error("Body transfer stalled: no data for {0:?}")]
    Stalled(std::time::Duration),

    #[error("Body transfer cancelled")]
    Cancelled,

    /// A sink failure the caller considers fatal for the whole run
    #[error("{0}")]
    Fatal(String),
}

impl SinkError {
    /// Returns true if the run should stop because of this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Result type alias for webdl operations
pub type Result<T> = std::result::Result<T, WebdlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunOptions};
pub use output::CrawlSummary;
pub use selector::{parse_clause_list, parse_group, SelectorClause, Selectors};
pub use state::{Page, PageInfo, Task, TaskKind, TaskState};
pub use crate::url::resolve;
