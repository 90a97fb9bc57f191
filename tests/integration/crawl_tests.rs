//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use webdl::config::Config;
use webdl::crawler::{Body, Coordinator, RunOptions};
use webdl::output::{DownloadSink, FileSink, PrintSink, ProgressSink, Template};
use webdl::selector::Selectors;
use webdl::state::PageInfo;
use webdl::{SinkError, WebdlError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Download sink that keeps every body in memory
#[derive(Default)]
struct MemorySink {
    saved: Mutex<Vec<(PageInfo, Vec<u8>)>>,
}

#[async_trait]
impl DownloadSink for MemorySink {
    async fn should_download(&self, _info: &PageInfo) -> bool {
        true
    }

    async fn persist(&self, info: &PageInfo, body: Body) -> Result<(), SinkError> {
        let bytes = body.into_bytes().await?;
        self.saved.lock().unwrap().push((info.clone(), bytes));
        Ok(())
    }
}

impl MemorySink {
    fn paths_by_index(&self) -> Vec<(String, usize)> {
        let mut saved: Vec<_> = self
            .saved
            .lock()
            .unwrap()
            .iter()
            .map(|(info, _)| (info.url.path().to_string(), info.index))
            .collect();
        saved.sort();
        saved
    }
}

#[derive(Default)]
struct RecordingPrinter {
    pages: Mutex<Vec<(String, Vec<Vec<String>>)>>,
}

impl PrintSink for RecordingPrinter {
    fn print(&self, info: &PageInfo, rows: &[Vec<String>]) -> Result<(), SinkError> {
        self.pages
            .lock()
            .unwrap()
            .push((info.url.path().to_string(), rows.to_vec()));
        Ok(())
    }
}

struct FailingPrinter;

impl PrintSink for FailingPrinter {
    fn print(&self, _info: &PageInfo, _rows: &[Vec<String>]) -> Result<(), SinkError> {
        Err(SinkError::Fatal("output closed".to_string()))
    }
}

#[derive(Default)]
struct RecordingProgress {
    ticks: Mutex<Vec<(bool, u64, u64)>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, error: Option<&WebdlError>, completed: u64, total: u64) {
        self.ticks
            .lock()
            .unwrap()
            .push((error.is_some(), completed, total));
    }
}

fn coordinator() -> Coordinator {
    Coordinator::from_config(&Config::default()).expect("Failed to build coordinator")
}

fn selectors(links: &str, downloads: &str) -> Selectors {
    Selectors::from_raw(&[links.to_string()], &[downloads.to_string()], &[], &[])
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_with_downloads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/a">A</a> <a href="/b">B</a>"#).await;
    mount_page(&server, "/a", r#"<img src="/img/a.png">"#).await;
    mount_page(&server, "/b", r#"<img src="img/b.png">"#).await;

    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-a".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/b.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-b".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let sink = FileSink::new(
        dir.path(),
        Template::parse_path("{name}.{ext}").unwrap(),
        false,
    );
    let options = RunOptions::new(vec![format!("{}/", server.uri())], selectors("a[href]", "img[src]"))
        .with_concurrency(4)
        .with_download_sink(Arc::new(sink));

    let summary = coordinator().run(options).await.expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.downloads_completed, 2);
    assert_eq!(summary.total_errors(), 0);
    assert_eq!(summary.visited, 5);

    assert_eq!(std::fs::read(dir.path().join("a.png")).unwrap(), b"png-a");
    assert_eq!(std::fs::read(dir.path().join("b.png")).unwrap(), b"png-b");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".webdl.tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_cyclic_graph_terminates() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/">self</a> <a href="/x">x</a>"#).await;
    mount_page(&server, "/x", r#"<a href="/">home</a>"#).await;

    let options = RunOptions::new(vec![format!("{}/", server.uri())], selectors("a[href]", ""));
    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator().run(options))
        .await
        .expect("Crawl did not terminate")
        .expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.duplicates_skipped, 2);
    assert_eq!(summary.visited, 2);
}

#[tokio::test]
async fn test_overlapping_graph_fetches_each_url_once() {
    let server = MockServer::start().await;

    let siblings = r#"<a href="/a">a</a> <a href="/b">b</a> <a href="/c">c</a>
        <a href="/shared.bin">file</a>"#;
    mount_page(&server, "/", siblings).await;
    mount_page(&server, "/a", siblings).await;
    mount_page(&server, "/b", siblings).await;
    mount_page(&server, "/c", siblings).await;

    Mock::given(method("GET"))
        .and(path("/shared.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::default());
    let options = RunOptions::new(
        vec![format!("{}/", server.uri())],
        selectors("a:not([href$='.bin'])[href]", "a[href$='.bin'][href]"),
    )
    .with_concurrency(8)
    .with_download_sink(sink.clone());

    let summary = coordinator().run(options).await.expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.downloads_completed, 1);
    assert_eq!(summary.visited, 5);
    // 4 pages each emit 3 links and 1 download: 16 children, 4 of them new
    assert_eq!(summary.duplicates_skipped, 12);
    assert_eq!(sink.saved.lock().unwrap()[0].1, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_referer_header_sent_for_children() {
    let server = MockServer::start().await;
    let root = format!("{}/", server.uri());

    mount_page(&server, "/", r#"<a href="/child">child</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/child"))
        .and(header("referer", root.as_str()))
        .respond_with(html("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let options = RunOptions::new(vec![root.clone()], selectors("a[href]", ""));
    let summary = coordinator().run(options).await.expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.pages_failed, 0);
}

#[tokio::test]
async fn test_failed_pages_do_not_stop_the_crawl() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/missing">x</a> <a href="/ok">y</a>"#).await;
    mount_page(&server, "/ok", "fine").await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let progress = Arc::new(RecordingProgress::default());
    let options = RunOptions::new(vec![format!("{}/", server.uri())], selectors("a[href]", ""))
        .with_progress_interval(Duration::from_secs(3600))
        .with_progress_sink(progress.clone());

    let summary = coordinator().run(options).await.expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.pages_failed, 1);

    let ticks = progress.ticks.lock().unwrap();
    assert_eq!(ticks.iter().filter(|(err, _, _)| *err).count(), 1);
    assert_eq!(ticks.last(), Some(&(false, 3, 3)));
}

#[tokio::test]
async fn test_cancellation_returns_promptly() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/child">child</a>"#).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    // Still queued behind the slow seed when the run is cancelled
    for route in ["/queued", "/child"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(""))
            .expect(0)
            .mount(&server)
            .await;
    }

    let cancel = CancellationToken::new();
    let options = RunOptions::new(
        vec![format!("{}/", server.uri()), format!("{}/queued", server.uri())],
        selectors("a[href]", ""),
    )
    .with_concurrency(1)
    .with_cancel(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), coordinator().run(options))
        .await
        .expect("Crawl did not stop after cancellation");

    assert!(matches!(result, Err(WebdlError::Cancelled)));

    // Give a stray worker time to dispatch before the expectations are checked
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_invalid_seed_fails_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let options = RunOptions::new(
        vec![format!("{}/", server.uri()), "::not a url::".to_string()],
        selectors("a[href]", ""),
    );
    let err = coordinator().run(options).await.unwrap_err();

    assert!(matches!(err, WebdlError::InvalidSeed { .. }));
}

#[tokio::test]
async fn test_print_rows_reach_print_sink() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/people",
        r#"<ul><li class="name">Alice</li><li class="name">Bob</li><li class="name">Carol</li></ul>
        <span class="age">30</span>"#,
    )
    .await;

    let printer = Arc::new(RecordingPrinter::default());
    let selectors = Selectors::from_raw(&[], &[], &[], &["li.name, span.age".to_string()]);
    let options = RunOptions::new(vec![format!("{}/people", server.uri())], selectors)
        .with_print_sink(printer.clone());

    coordinator().run(options).await.expect("Crawl failed");

    let pages = printer.pages.lock().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].0, "/people");
    assert_eq!(
        pages[0].1,
        vec![
            vec!["Alice".to_string(), "30".to_string()],
            vec!["Bob".to_string(), String::new()],
            vec!["Carol".to_string(), String::new()],
        ]
    );
}

#[tokio::test]
async fn test_fatal_sink_error_aborts_run() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<p>row</p> <a href="/next">next</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("<p>row</p>"))
        .expect(0..=1)
        .mount(&server)
        .await;

    let selectors = Selectors::from_raw(&["a[href]".to_string()], &[], &[], &["p".to_string()]);
    let options = RunOptions::new(vec![format!("{}/", server.uri())], selectors)
        .with_concurrency(1)
        .with_print_sink(Arc::new(FailingPrinter));

    let err = coordinator().run(options).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        WebdlError::Sink {
            source: SinkError::Fatal(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_reverse_download_indices_and_title() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/album",
        r#"<h1>  My
        Album </h1>
        <img src="/p/0.jpg"><img src="/p/1.jpg"><img src="/p/2.jpg">"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path_regex_jpg())
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpg".to_vec()))
        .expect(3)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::default());
    let selectors = Selectors::from_raw(&[], &["img[src]".to_string()], &["h1".to_string()], &[]);
    let options = RunOptions::new(vec![format!("{}/album", server.uri())], selectors)
        .with_reverse(false, true)
        .with_download_sink(sink.clone());

    let summary = coordinator().run(options).await.expect("Crawl failed");
    assert_eq!(summary.downloads_completed, 3);

    assert_eq!(
        sink.paths_by_index(),
        vec![
            ("/p/0.jpg".to_string(), 2),
            ("/p/1.jpg".to_string(), 1),
            ("/p/2.jpg".to_string(), 0),
        ]
    );

    for (info, _) in sink.saved.lock().unwrap().iter() {
        assert_eq!(info.title, "My Album");
        assert_eq!(info.referer().map(|u| u.path()), Some("/album"));
    }
}

#[tokio::test]
async fn test_dry_run_declines_downloads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<img src="/a.png"><img src="/b.png">"#).await;
    Mock::given(method("GET"))
        .and(path_regex_png())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = FileSink::new(
        dir.path(),
        Template::parse_path("{name}.{ext}").unwrap(),
        true,
    );
    let options = RunOptions::new(vec![format!("{}/", server.uri())], selectors("", "img[src]"))
        .with_download_sink(Arc::new(sink));

    let summary = coordinator().run(options).await.expect("Crawl failed");

    assert_eq!(summary.downloads_declined, 2);
    assert_eq!(summary.downloads_completed, 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

fn path_regex_jpg() -> wiremock::matchers::PathRegexMatcher {
    wiremock::matchers::path_regex(r"^/p/\d\.jpg$")
}

fn path_regex_png() -> wiremock::matchers::PathRegexMatcher {
    wiremock::matchers::path_regex(r"\.png$")
}

/// Serves `/` as a page linking `/file.bin`, whose body of `bytes` bytes is
/// written one byte at a time with `gap` between writes
async fn trickle_server(bytes: usize, gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.set_nodelay(true);
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                if request.starts_with(b"GET /file.bin ") {
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        bytes
                    );
                    if socket.write_all(head.as_bytes()).await.is_err() {
                        return;
                    }
                    for _ in 0..bytes {
                        tokio::time::sleep(gap).await;
                        if socket.write_all(b"x").await.is_err() {
                            return;
                        }
                    }
                } else {
                    let body = r#"<html><body><img src="/file.bin"></body></html>"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/", addr)
}

fn short_timeout_coordinator() -> Coordinator {
    let mut config = Config::default();
    config.crawler.timeout_secs = 1;
    Coordinator::from_config(&config).expect("Failed to build coordinator")
}

#[tokio::test]
async fn test_slow_download_outlives_timeout_while_data_flows() {
    let seed = trickle_server(6, Duration::from_millis(400)).await;

    let sink = Arc::new(MemorySink::default());
    let options = RunOptions::new(vec![seed], selectors("", "img[src]"))
        .with_download_sink(sink.clone());

    let summary = short_timeout_coordinator()
        .run(options)
        .await
        .expect("Crawl failed");

    assert_eq!(summary.downloads_failed, 0);
    assert_eq!(summary.downloads_completed, 1);
    assert_eq!(sink.saved.lock().unwrap()[0].1, b"xxxxxx".to_vec());
}

#[tokio::test]
async fn test_stalled_download_fails() {
    let seed = trickle_server(2, Duration::from_secs(5)).await;

    let sink = Arc::new(MemorySink::default());
    let progress = Arc::new(RecordingProgress::default());
    let options = RunOptions::new(vec![seed], selectors("", "img[src]"))
        .with_download_sink(sink.clone())
        .with_progress_sink(progress.clone());

    let summary = tokio::time::timeout(
        Duration::from_secs(4),
        short_timeout_coordinator().run(options),
    )
    .await
    .expect("Stalled transfer was not abandoned")
    .expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.downloads_failed, 1);
    assert!(sink.saved.lock().unwrap().is_empty());
    let ticks = progress.ticks.lock().unwrap();
    assert_eq!(ticks.iter().filter(|(err, _, _)| *err).count(), 1);
}

/// Random directed graphs of up to six pages with up to three links each,
/// self-loops and cycles included
fn link_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..7).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0..n, 0..4), n))
}

fn reachable_from_first(graph: &[Vec<usize>]) -> HashSet<usize> {
    let mut seen = HashSet::from([0]);
    let mut queue = VecDeque::from([0]);
    while let Some(node) = queue.pop_front() {
        for &next in &graph[node] {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

async fn crawl_graph(graph: Vec<Vec<usize>>) {
    let server = MockServer::start().await;
    for (node, edges) in graph.iter().enumerate() {
        let links: String = edges
            .iter()
            .map(|to| format!(r#"<a href="/n{}">{}</a>"#, to, to))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/n{}", node)))
            .respond_with(html(&links))
            .mount(&server)
            .await;
    }

    let options = RunOptions::new(vec![format!("{}/n0", server.uri())], selectors("a[href]", ""))
        .with_concurrency(4);
    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator().run(options))
        .await
        .expect("Crawl did not terminate")
        .expect("Crawl failed");

    let reachable = reachable_from_first(&graph);
    let edges: usize = reachable.iter().map(|&node| graph[node].len()).sum();

    let mut hits: HashMap<String, usize> = HashMap::new();
    for request in server.received_requests().await.unwrap_or_default() {
        *hits.entry(request.url.path().to_string()).or_default() += 1;
    }
    assert!(
        hits.values().all(|&n| n == 1),
        "page fetched more than once: {:?}",
        hits
    );

    let fetched: HashSet<_> = hits.into_keys().collect();
    let expected: HashSet<_> = reachable.iter().map(|node| format!("/n{}", node)).collect();
    assert_eq!(fetched, expected);

    assert_eq!(summary.visited as usize, reachable.len());
    assert_eq!(summary.pages_fetched as usize, reachable.len());
    assert_eq!(summary.total_tasks() as usize, 1 + edges);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_link_graphs_fetch_each_page_once(graph in link_graph()) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(crawl_graph(graph));
    }
}
