//! Progress accounting and rate-limited reporting

use crate::output::ProgressSink;
use crate::WebdlError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Tracks completed/total task counts and forwards ticks to a sink
///
/// Regular ticks are emitted at most once per `interval`. Errors and the
/// final report always go through. Errors caused by cancellation are not
/// reported; the run's own result carries the cancellation.
pub struct ProgressTracker {
    completed: AtomicU64,
    total: AtomicU64,
    interval: Duration,
    last_report: Mutex<Option<Instant>>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressTracker {
    pub fn new(initial_total: u64, interval: Duration, sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total: AtomicU64::new(initial_total),
            interval,
            last_report: Mutex::new(None),
            sink,
        }
    }

    /// Grows the denominator by `n` newly discovered tasks
    pub fn add_total(&self, n: u64) {
        self.total.fetch_add(n, Ordering::AcqRel);
    }

    /// Records one finished task and reports it
    pub fn complete(&self, error: Option<&WebdlError>) {
        self.completed.fetch_add(1, Ordering::AcqRel);
        self.report(error, false);
    }

    /// Emits the final report regardless of the interval
    pub fn finish(&self) {
        self.report(None, true);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    fn report(&self, error: Option<&WebdlError>, force: bool) {
        let Some(sink) = &self.sink else {
            return;
        };

        if error.is_some_and(WebdlError::is_cancellation) {
            return;
        }

        {
            let mut last = self
                .last_report
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let due = last.map_or(true, |at| at.elapsed() >= self.interval);
            if !(force || error.is_some() || due) {
                return;
            }
            *last = Some(Instant::now());
        }

        sink.report(error, self.completed(), self.total());
    }
}
