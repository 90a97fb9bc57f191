//! URL handling module for webdl
//!
//! Hyperlink references matched on a page are turned into absolute URLs here
//! before they enter the crawl frontier.

mod resolve;

pub use resolve::resolve;
