//! Output side of a crawl
//!
//! This module handles:
//! - Sink traits the engine reports downloads, print rows and progress into
//! - The file, stdout and terminal implementations used by the binary
//! - Naming templates and run statistics

mod files;
mod printer;
mod progress;
pub mod stats;
pub mod template;
mod traits;

pub use files::{cleanup_temp_files, FileSink, TEMP_SUFFIX};
pub use printer::Printer;
pub use progress::{format_progress, TerminalProgress};
pub use stats::{CrawlSummary, RunStats};
pub use template::{Template, TemplateData};
pub use traits::{DownloadSink, PrintSink, ProgressSink};

use std::fmt::Write;

/// Formats a crawl summary as the plain-text report printed after a run
pub fn format_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Pages fetched:       {}", summary.pages_fetched);
    let _ = writeln!(out, "Pages failed:        {}", summary.pages_failed);
    let _ = writeln!(out, "Downloads completed: {}", summary.downloads_completed);
    let _ = writeln!(out, "Downloads skipped:   {}", summary.downloads_declined);
    let _ = writeln!(out, "Downloads failed:    {}", summary.downloads_failed);
    let _ = writeln!(out, "Duplicates skipped:  {}", summary.duplicates_skipped);
    let _ = write!(out, "URLs visited:        {}", summary.visited);
    out
}
