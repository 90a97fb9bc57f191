//! Configuration module for webdl
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key is optional; command-line flags are merged on top by the
//! binary.
//!
//! # Example
//!
//! ```no_run
//! use webdl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("webdl.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, SelectorConfig, DEFAULT_DOWNLOAD_FORMAT,
    DEFAULT_PRINT_FORMAT, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
