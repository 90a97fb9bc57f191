//! webdl main entry point
//!
//! This is the command-line interface for the webdl recursive downloader.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use webdl::config::{load_config_with_hash, validate, Config};
use webdl::crawler::{Coordinator, RunOptions};
use webdl::output::{cleanup_temp_files, format_summary, FileSink, Printer, TerminalProgress};
use webdl::WebdlError;

/// webdl: a selector-driven recursive web downloader
///
/// Starting from the given URLs, webdl follows links matched by the link
/// selectors, prints data matched by the print selectors and downloads
/// resources matched by the download selectors.
///
/// Selectors are CSS queries with an optional trailing `[attribute]`, e.g.
/// `a.next[href]` or `img.photo[src]`. Several may be given comma separated
/// or by repeating the flag.
#[derive(Parser, Debug)]
#[command(name = "webdl")]
#[command(version = "1.0.0")]
#[command(about = "A selector-driven recursive web downloader", long_about = None)]
struct Cli {
    /// Seed URLs to start crawling from
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Selector for links to recurse into
    #[arg(short, long = "links", value_name = "SELECTOR")]
    links: Vec<String>,

    /// Selector for resources to download
    #[arg(short, long = "downloads", value_name = "SELECTOR")]
    downloads: Vec<String>,

    /// Selector for columns to print, one row per match
    #[arg(short, long = "prints", value_name = "SELECTOR")]
    prints: Vec<String>,

    /// Selector for the page title
    #[arg(short, long = "titles", value_name = "SELECTOR")]
    titles: Vec<String>,

    /// Directory downloads are written under
    #[arg(short = 'o', long = "dir", value_name = "DIR")]
    dir: Option<String>,

    /// Template for the destination path of each download
    #[arg(long, value_name = "TEMPLATE")]
    download_format: Option<String>,

    /// Template for each printed row
    #[arg(long, value_name = "TEMPLATE")]
    print_format: Option<String>,

    /// Number links on each page from last to first
    #[arg(long)]
    reverse_links: bool,

    /// Number downloads on each page from last to first
    #[arg(long)]
    reverse_downloads: bool,

    /// Number of concurrent workers
    #[arg(short = 'j', long, value_name = "N")]
    concurrency: Option<usize>,

    /// Show what would be downloaded without downloading
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Do not show the progress line
    #[arg(long)]
    no_progress: bool,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webdl=warn,error"),
            1 => EnvFilter::new("webdl=info,warn"),
            2 => EnvFilter::new("webdl=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file, if any, and applies command-line overrides
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    config.seeds.extend(cli.urls.iter().cloned());
    config.selectors.links.extend(cli.links.iter().cloned());
    config.selectors.downloads.extend(cli.downloads.iter().cloned());
    config.selectors.prints.extend(cli.prints.iter().cloned());
    config.selectors.titles.extend(cli.titles.iter().cloned());

    if let Some(dir) = &cli.dir {
        config.output.directory = dir.clone();
    }
    if let Some(format) = &cli.download_format {
        config.output.download_format = format.clone();
    }
    if let Some(format) = &cli.print_format {
        config.output.print_format = format.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }
    config.crawler.reverse_links |= cli.reverse_links;
    config.crawler.reverse_downloads |= cli.reverse_downloads;
    config.output.dry_run |= cli.dry_run;
    if cli.no_progress {
        config.output.progress = false;
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    if config.seeds.is_empty() {
        anyhow::bail!("no URLs given");
    }

    let coordinator = Coordinator::from_config(&config)?;
    let files = FileSink::from_config(&config.output)?;
    let printer = Printer::from_config(&config.output)?;
    let progress = TerminalProgress::new(!config.output.dry_run, config.output.progress);
    let root = files.root().to_path_buf();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping crawl");
            on_interrupt.cancel();
        }
    });

    let downloads = !config.selectors.downloads.is_empty();
    let mut options = RunOptions::from_config(&config)
        .with_print_sink(Arc::new(printer))
        .with_progress_sink(Arc::new(progress))
        .with_cancel(cancel);
    if downloads {
        options = options.with_download_sink(Arc::new(files));
    }

    let result = coordinator.run(options).await;
    progress.finish();

    if downloads && !config.output.dry_run {
        match cleanup_temp_files(&root).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Removed {} temporary files", n),
            Err(e) => tracing::warn!("Failed to clean up temporary files: {}", e),
        }
    }

    match result {
        Ok(summary) => {
            tracing::info!("\n{}", format_summary(&summary));
            if summary.total_errors() > 0 {
                tracing::warn!("{} tasks failed", summary.total_errors());
            }
            Ok(())
        }
        Err(WebdlError::Cancelled) => anyhow::bail!("crawl cancelled"),
        Err(e) => Err(e).context("crawl failed"),
    }
}
