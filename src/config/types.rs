use crate::selector::Selectors;
use serde::Deserialize;
use std::time::Duration;

/// Browser-like user agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";

/// Default destination path template for downloads
pub const DEFAULT_DOWNLOAD_FORMAT: &str =
    "{page_index:06} - {title|alphanum}/{index:06} - {name|alphanum}.{ext|alphanum}";

/// Default template for print rows
pub const DEFAULT_PRINT_FORMAT: &str = "{row}";

/// Main configuration structure for webdl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Seed URLs to start crawling from
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent workers (and depth of the task queue)
    pub concurrency: usize,

    /// Minimum time between regular progress reports (milliseconds)
    #[serde(rename = "progress-interval-ms")]
    pub progress_interval_ms: u64,

    /// Wait for response headers, and between body chunks (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Number links on a page from last to first
    #[serde(rename = "reverse-links")]
    pub reverse_links: bool,

    /// Number downloads on a page from last to first
    #[serde(rename = "reverse-downloads")]
    pub reverse_downloads: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            progress_interval_ms: 50,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            reverse_links: false,
            reverse_downloads: false,
        }
    }
}

/// Raw selector rules; each entry may hold several comma-separated clauses
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub links: Vec<String>,
    pub downloads: Vec<String>,
    pub prints: Vec<String>,
    pub titles: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory downloads are written under
    pub directory: String,

    /// Template for the relative destination path of each download
    #[serde(rename = "download-format")]
    pub download_format: String,

    /// Template for each printed row
    #[serde(rename = "print-format")]
    pub print_format: String,

    /// Report what would be downloaded instead of downloading
    #[serde(rename = "dry-run")]
    pub dry_run: bool,

    /// Show the progress line on stderr
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            download_format: DEFAULT_DOWNLOAD_FORMAT.to_string(),
            print_format: DEFAULT_PRINT_FORMAT.to_string(),
            dry_run: false,
            progress: true,
        }
    }
}

impl Config {
    /// Parses the raw selector rules into clause groups
    pub fn selectors(&self) -> Selectors {
        Selectors::from_raw(
            &self.selectors.links,
            &self.selectors.downloads,
            &self.selectors.titles,
            &self.selectors.prints,
        )
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.crawler.progress_interval_ms)
    }
}
