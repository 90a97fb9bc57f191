//! Crawl frontier: work queue, visited set and completion tracking
//!
//! This module handles:
//! - The bounded task queue shared by the worker pool
//! - A non-blocking submission path for newly discovered children, drained
//!   into the bounded queue by a router task
//! - At-most-once visiting keyed on the literal URL string
//! - Counting outstanding tasks to detect when the crawl has drained

use crate::state::Task;
use dashmap::DashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Set of URLs already claimed by a worker during one crawl
///
/// Claiming is a single insert-if-absent on a concurrent set, so two workers
/// racing on the same URL can never both win.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `url`, returning false if it was claimed before
    pub fn claim(&self, url: &Url) -> bool {
        self.seen.insert(url.as_str().to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Live count of tasks not yet terminally resolved
///
/// Children are added before their parent finishes, so the count only
/// reaches zero once every discovered task has run.
#[derive(Debug)]
pub struct Outstanding {
    count: AtomicUsize,
}

impl Outstanding {
    pub fn new(initial: usize) -> Self {
        Self {
            count: AtomicUsize::new(initial),
        }
    }

    /// Registers `n` newly discovered tasks
    pub fn add(&self, n: usize) {
        self.count.fetch_add(n, Ordering::AcqRel);
    }

    /// Marks one task finished; returns true if that drained the crawl
    pub fn finish_one(&self) -> bool {
        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(previous) => previous == 1,
            Err(_) => {
                tracing::error!("Outstanding task count would go negative");
                false
            }
        }
    }
}

/// The shared work queue
///
/// Workers pull from a bounded queue whose depth equals the pool size.
/// Discovered children go through an unbounded submission channel instead,
/// so a worker never blocks on a full queue it is itself supposed to drain.
#[derive(Debug)]
pub struct Frontier {
    submit: mpsc::UnboundedSender<Task>,
    queue: Mutex<mpsc::Receiver<Task>>,
}

/// Moves submitted tasks into the bounded queue
///
/// Blocking on a full queue throttles how far the frontier runs ahead of
/// the workers without ever blocking a worker.
#[derive(Debug)]
pub struct Router {
    inbox: mpsc::UnboundedReceiver<Task>,
    queue: mpsc::Sender<Task>,
}

impl Frontier {
    /// Creates a frontier with a bounded queue of `depth` entries
    pub fn new(depth: usize) -> (Self, Router) {
        let (submit, inbox) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::channel(depth.max(1));

        (
            Self {
                submit,
                queue: Mutex::new(queue_rx),
            },
            Router {
                inbox,
                queue: queue_tx,
            },
        )
    }

    /// Hands tasks to the router without waiting for queue space
    pub fn submit<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = Task>,
    {
        for task in tasks {
            if self.submit.send(task).is_err() {
                tracing::debug!("Frontier router stopped, dropping submitted task");
                return;
            }
        }
    }

    /// Waits for the next task; `None` once the router has shut down
    pub async fn next(&self) -> Option<Task> {
        self.queue.lock().await.recv().await
    }
}

impl Router {
    /// Forwards tasks until `stop` fires or every submitter is gone
    pub async fn run(mut self, stop: CancellationToken) {
        loop {
            let task = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                task = self.inbox.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                sent = self.queue.send(task) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
