//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drives a crawl:
//! - Seeding the frontier and tracking outstanding work
//! - Claiming each URL at most once
//! - Fetching pages, extracting from them and enqueuing their children
//! - Fetching downloads and handing them to the download sink
//! - Progress reporting and first-failure cancellation

use crate::config::Config;
use crate::crawler::extractor::{extract, CompiledSelectors};
use crate::crawler::fetcher::{build_http_client, fetch};
use crate::crawler::frontier::{Frontier, Outstanding, VisitedSet};
use crate::crawler::progress::ProgressTracker;
use crate::output::{CrawlSummary, DownloadSink, PrintSink, ProgressSink, RunStats};
use crate::selector::Selectors;
use crate::state::{PageInfo, Task, TaskKind, TaskState};
use crate::{Result, WebdlError};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Default number of workers
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default minimum time between regular progress reports
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Everything one crawl run is driven by
#[derive(Clone)]
pub struct RunOptions {
    /// Seed URLs, fetched as pages
    pub seeds: Vec<String>,

    pub selectors: Selectors,

    /// Worker count, also the depth of the task queue
    pub concurrency: usize,

    pub progress_interval: Duration,

    pub reverse_links: bool,

    pub reverse_downloads: bool,

    /// Receives matched downloads; without one every download is skipped
    pub download_sink: Option<Arc<dyn DownloadSink>>,

    pub print_sink: Option<Arc<dyn PrintSink>>,

    pub progress_sink: Option<Arc<dyn ProgressSink>>,

    /// Cancelling this token stops the run
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new(seeds: Vec<String>, selectors: Selectors) -> Self {
        Self {
            seeds,
            selectors,
            concurrency: DEFAULT_CONCURRENCY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            reverse_links: false,
            reverse_downloads: false,
            download_sink: None,
            print_sink: None,
            progress_sink: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Options carrying the seeds, selectors and crawler settings of `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.crawler.concurrency,
            progress_interval: config.progress_interval(),
            reverse_links: config.crawler.reverse_links,
            reverse_downloads: config.crawler.reverse_downloads,
            ..Self::new(config.seeds.clone(), config.selectors())
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_reverse(mut self, links: bool, downloads: bool) -> Self {
        self.reverse_links = links;
        self.reverse_downloads = downloads;
        self
    }

    pub fn with_download_sink(mut self, sink: Arc<dyn DownloadSink>) -> Self {
        self.download_sink = Some(sink);
        self
    }

    pub fn with_print_sink(mut self, sink: Arc<dyn PrintSink>) -> Self {
        self.print_sink = Some(sink);
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Default wait for response headers and, per chunk, for body data
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Main crawler coordinator structure
///
/// Holds the HTTP client; each call to [`Coordinator::run`] is an
/// independent crawl with its own visited set.
pub struct Coordinator {
    client: Client,
    timeout: Duration,
}

impl Coordinator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a coordinator whose client uses the configured user agent and timeout
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(&config.crawler).map_err(WebdlError::Client)?;
        Ok(Self::new(client).with_timeout(Duration::from_secs(config.crawler.timeout_secs)))
    }

    /// Sets how long a request may wait for headers, or a transfer for its next chunk
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one crawl to completion
    ///
    /// Seeds and selectors are validated before any request is made. The run
    /// ends when every discovered task has finished, or early on the first
    /// fatal error or cancellation.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Every task reached a terminal state
    /// * `Err(WebdlError)` - The first fatal error observed, or
    ///   [`WebdlError::Cancelled`]
    pub async fn run(&self, options: RunOptions) -> Result<CrawlSummary> {
        let seeds = options
            .seeds
            .iter()
            .map(|seed| {
                Url::parse(seed.trim()).map_err(|source| WebdlError::InvalidSeed {
                    url: seed.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let selectors = CompiledSelectors::compile(&options.selectors)?;

        if options.cancel.is_cancelled() {
            return Err(WebdlError::Cancelled);
        }
        if seeds.is_empty() {
            info!("No seed URLs, nothing to crawl");
            return Ok(CrawlSummary::new());
        }

        let concurrency = options.concurrency.max(1);
        let cancel = options.cancel.child_token();
        let stop = cancel.child_token();
        let (frontier, router) = Frontier::new(concurrency);

        let run = Arc::new(Run {
            client: self.client.clone(),
            timeout: self.timeout,
            selectors,
            reverse_links: options.reverse_links,
            reverse_downloads: options.reverse_downloads,
            download_sink: options.download_sink,
            print_sink: options.print_sink,
            frontier,
            visited: VisitedSet::new(),
            outstanding: Outstanding::new(seeds.len()),
            progress: ProgressTracker::new(
                seeds.len() as u64,
                options.progress_interval,
                options.progress_sink,
            ),
            stats: RunStats::new(),
            cancel: cancel.clone(),
            stop: stop.clone(),
            first_error: Mutex::new(None),
        });

        info!(
            "Starting crawl of {} seed(s) with {} workers",
            seeds.len(),
            concurrency
        );
        let start_time = Instant::now();

        run.frontier
            .submit(seeds.into_iter().enumerate().map(|(index, url)| {
                let mut info = PageInfo::seed(url);
                info.index = index;
                Task::page(info)
            }));

        let router = tokio::spawn(router.run(stop.clone()));

        let mut workers: FuturesUnordered<_> = (0..concurrency)
            .map(|id| tokio::spawn(worker(Arc::clone(&run), id)))
            .collect();

        while let Some(joined) = workers.next().await {
            if let Err(e) = joined {
                error!("Crawl worker terminated abnormally: {}", e);
                run.abort(WebdlError::Worker(e.to_string()));
            }
        }

        stop.cancel();
        if let Err(e) = router.await {
            warn!("Frontier router terminated abnormally: {}", e);
        }
        run.progress.finish();

        if let Some(e) = run.take_error() {
            info!(
                "Crawl aborted after {:.2}s: {}",
                start_time.elapsed().as_secs_f64(),
                e
            );
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(WebdlError::Cancelled);
        }

        let summary = run.stats.summary(run.visited.len() as u64);
        info!(
            "Crawl complete in {:.2}s: {} pages, {} downloads, {} errors",
            start_time.elapsed().as_secs_f64(),
            summary.pages_fetched,
            summary.downloads_completed,
            summary.total_errors()
        );
        Ok(summary)
    }
}

/// State shared by the workers of one run
struct Run {
    client: Client,
    timeout: Duration,
    selectors: CompiledSelectors,
    reverse_links: bool,
    reverse_downloads: bool,
    download_sink: Option<Arc<dyn DownloadSink>>,
    print_sink: Option<Arc<dyn PrintSink>>,
    frontier: Frontier,
    visited: VisitedSet,
    outstanding: Outstanding,
    progress: ProgressTracker,
    stats: RunStats,
    /// Cancelled on a fatal error or by the caller
    cancel: CancellationToken,
    /// Cancelled once the crawl drained or `cancel` fired
    stop: CancellationToken,
    first_error: Mutex<Option<WebdlError>>,
}

async fn worker(run: Arc<Run>, id: usize) {
    debug!("Worker {} started", id);

    loop {
        let task = tokio::select! {
            biased;
            _ = run.stop.cancelled() => break,
            task = run.frontier.next() => match task {
                Some(task) => task,
                None => break,
            },
        };

        // Nothing new starts once the run is cancelled
        if run.cancel.is_cancelled() {
            run.abort(WebdlError::Cancelled);
            break;
        }

        run.process(task).await;
    }

    debug!("Worker {} stopped", id);
}

impl Run {
    async fn process(&self, task: Task) {
        let Task { info, kind } = task;
        let url = info.url.clone();

        if !self.visited.claim(&url) {
            debug!("Skipping already visited {}", url);
            self.finish(&url, kind, TaskState::Queued, TaskState::Skipped, None);
            return;
        }

        let running = TaskState::Queued
            .transition(TaskState::Running)
            .unwrap_or_else(|e| {
                error!("Task {}: {}", url, e);
                TaskState::Running
            });

        let result = match kind {
            TaskKind::Page => self.process_page(info).await,
            TaskKind::Download => self.process_download(&info).await,
        };

        match result {
            Ok(state) => self.finish(&url, kind, running, state, None),
            Err(e) => self.finish(&url, kind, running, TaskState::Failed, Some(e)),
        }
    }

    /// Fetches a page, hands its print rows on and enqueues its children
    async fn process_page(&self, info: PageInfo) -> Result<TaskState> {
        let body = fetch(&self.client, &info, self.timeout, &self.cancel).await?;
        let html = body.text().await?;
        let page = extract(&html, info, &self.selectors);

        let children = page.child_tasks(self.reverse_links, self.reverse_downloads);
        debug!(
            "Extracted {} links and {} downloads from {} (depth {})",
            page.links.len(),
            page.downloads.len(),
            page.info.url,
            page.info.depth()
        );

        // Counted before they are queued so the total never under-reports
        self.outstanding.add(children.len());
        self.progress.add_total(children.len() as u64);

        let printed = match &self.print_sink {
            Some(sink) if !page.print_rows.is_empty() => sink
                .print(&page.info, &page.print_rows)
                .map_err(|source| WebdlError::Sink {
                    url: page.info.url.to_string(),
                    source,
                }),
            _ => Ok(()),
        };

        self.frontier.submit(children);
        printed.map(|_| TaskState::Succeeded)
    }

    /// Fetches a download the sink wants and lets the sink persist it
    async fn process_download(&self, info: &PageInfo) -> Result<TaskState> {
        let Some(sink) = &self.download_sink else {
            return Ok(TaskState::Skipped);
        };

        if !sink.should_download(info).await {
            debug!("Download sink declined {}", info.url);
            return Ok(TaskState::Skipped);
        }

        let body = fetch(&self.client, info, self.timeout, &self.cancel).await?;
        sink.persist(info, body)
            .await
            .map_err(|source| WebdlError::Sink {
                url: info.url.to_string(),
                source,
            })?;

        Ok(TaskState::Succeeded)
    }

    /// Moves a task into its terminal state and accounts for it
    fn finish(
        &self,
        url: &Url,
        kind: TaskKind,
        from: TaskState,
        to: TaskState,
        error: Option<WebdlError>,
    ) {
        match from.transition(to) {
            Ok(state) => self.stats.record(kind, from, state),
            Err(e) => error!("Task {}: {}", url, e),
        }

        match &error {
            Some(e) if e.is_cancellation() => debug!("{:?} task {} cancelled", kind, url),
            Some(e) => warn!("{:?} task {} failed: {}", kind, url, e),
            None => debug!("{:?} task {} {}", kind, url, to),
        }

        self.progress.complete(error.as_ref());

        if let Some(e) = error {
            if e.is_fatal() {
                self.abort(e);
            }
        }

        if self.outstanding.finish_one() {
            debug!("All tasks finished, stopping workers");
            self.stop.cancel();
        }
    }

    /// Records the first fatal error and cancels the run
    fn abort(&self, error: WebdlError) {
        {
            let mut first = self
                .first_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if first.is_none() {
                *first = Some(error);
            }
        }
        self.cancel.cancel();
    }

    fn take_error(&self) -> Option<WebdlError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
