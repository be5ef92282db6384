use std::ops::RangeInclusive;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::{IngestError, Result};
use crate::processors::work_queue::{WorkItem, WorkQueue};
use crate::processors::worker::{WorkerContext, WorkerStats};
use crate::readers::{enumerate, PayloadFetcher, SourceCatalog};
use crate::store::{self, DedupLedger};
use crate::utils::progress::ProgressReporter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerFailure {
    pub worker: usize,
    pub error: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub queued: u64,
    pub workers: usize,
    pub workers_terminated: usize,
    pub reclaimed: usize,
    pub stats: WorkerStats,
    pub worker_failures: Vec<WorkerFailure>,
    pub residual_sentinels: usize,
    pub unprocessed: usize,
}

impl IngestReport {
    /// Every worker reached the sentinel and exactly one sentinel was left.
    pub fn is_success(&self) -> bool {
        self.worker_failures.is_empty()
            && self.workers_terminated == self.workers
            && self.residual_sentinels == 1
            && self.unprocessed == 0
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Ingestion Summary:\n\
            - Identifiers queued: {}\n\
            - Workers: {} ({} terminated cleanly)\n\
            - Stale reservations reclaimed: {}\n\
            - Already ingested: {}\n\
            - Complete: {}\n\
            - Partial: {}\n\
            - Rejected: {}\n\
            - Fetch failures (will retry): {}\n\
            - Rows loaded: {}\n\
            - Columns added: {}\n",
            self.queued,
            self.workers,
            self.workers_terminated,
            self.reclaimed,
            self.stats.skipped,
            self.stats.complete,
            self.stats.partial,
            self.stats.rejected,
            self.stats.fetch_failed,
            self.stats.rows_loaded,
            self.stats.columns_added,
        );

        for failure in &self.worker_failures {
            summary.push_str(&format!(
                "- Worker {} failed: {}\n",
                failure.worker, failure.error
            ));
        }
        if self.residual_sentinels != 1 || self.unprocessed > 0 {
            summary.push_str(&format!(
                "- Queue left with {} sentinel(s) and {} unprocessed identifier(s)\n",
                self.residual_sentinels, self.unprocessed
            ));
        }

        summary
    }
}

/// Drives one run: store setup, catalog enumeration, the worker pool and
/// the final queue check.
pub struct IngestCoordinator {
    settings: Settings,
    silent: bool,
}

impl IngestCoordinator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            silent: false,
        }
    }

    /// Suppress the progress bar.
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn run<C, F>(
        &self,
        catalog: &C,
        fetcher: F,
        years: RangeInclusive<i32>,
    ) -> Result<IngestReport>
    where
        C: SourceCatalog + ?Sized,
        F: PayloadFetcher + Clone + 'static,
    {
        let workers = self.settings.workers.max(1);
        let mut report = IngestReport {
            workers,
            ..IngestReport::default()
        };

        {
            let conn = store::open(
                Path::new(&self.settings.database_path),
                self.settings.busy_timeout(),
            )?;
            store::bootstrap(&conn)?;
            report.reclaimed = DedupLedger::reclaim_stale(&conn)?;
        }
        if report.reclaimed > 0 {
            warn!(
                count = report.reclaimed,
                "Reclaimed reservations left by an interrupted run"
            );
        }

        let queue = WorkQueue::new();
        info!(
            first = years.start(),
            last = years.end(),
            "Enumerating catalog"
        );
        for identifier in enumerate(catalog, years) {
            queue.push_source(identifier?)?;
            report.queued += 1;
        }
        queue.shutdown()?;
        info!(queued = report.queued, workers, "Catalog enumerated");

        let handles = (0..workers)
            .map(|id| self.spawn_worker(id, &queue, fetcher.clone()))
            .collect::<Result<Vec<_>>>()?;

        self.monitor(&handles, &queue, report.queued);

        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(stats)) => {
                    report.stats.merge(&stats);
                    report.workers_terminated += 1;
                }
                Ok(Err(e)) => {
                    error!(worker = id, error = %e, "Worker failed");
                    report.worker_failures.push(WorkerFailure {
                        worker: id,
                        error: e.to_string(),
                    });
                }
                Err(_) => {
                    let e = IngestError::WorkerPanicked(id);
                    error!(worker = id, "{}", e);
                    report.worker_failures.push(WorkerFailure {
                        worker: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        for item in queue.drain() {
            match item {
                WorkItem::Shutdown => report.residual_sentinels += 1,
                WorkItem::Source(_) => report.unprocessed += 1,
            }
        }
        if report.residual_sentinels != 1 {
            warn!(
                sentinels = report.residual_sentinels,
                "Unexpected sentinel count after shutdown"
            );
        }

        info!(
            rows = report.stats.rows_loaded,
            complete = report.stats.complete,
            failures = report.worker_failures.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    fn spawn_worker<F>(
        &self,
        id: usize,
        queue: &WorkQueue,
        fetcher: F,
    ) -> Result<JoinHandle<Result<WorkerStats>>>
    where
        F: PayloadFetcher + 'static,
    {
        let settings = self.settings.clone();
        let queue = queue.clone();

        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || WorkerContext::open(id, &settings, fetcher)?.run(&queue))?;
        Ok(handle)
    }

    /// Show progress until every worker thread has exited.
    fn monitor(&self, handles: &[JoinHandle<Result<WorkerStats>>], queue: &WorkQueue, queued: u64) {
        let progress = ProgressReporter::new(queued, "Ingesting weather files...", self.silent);
        let interval = self.settings.progress_interval();
        let mut last_report = Instant::now();

        while !handles.iter().all(|h| h.is_finished()) {
            // The sentinel sits at the tail until the queue is empty
            let waiting = (queue.len() as u64).saturating_sub(1).min(queued);
            progress.update(queued - waiting);

            if last_report.elapsed() >= interval {
                info!(queue_depth = waiting, "Queue depth");
                last_report = Instant::now();
            }
            thread::sleep(POLL_INTERVAL);
        }

        progress.update(queued);
        progress.finish_with_message("Ingestion complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_success_requires_single_sentinel() {
        let mut report = IngestReport {
            workers: 2,
            workers_terminated: 2,
            residual_sentinels: 1,
            ..IngestReport::default()
        };
        assert!(report.is_success());

        report.residual_sentinels = 0;
        assert!(!report.is_success());

        report.residual_sentinels = 1;
        report.worker_failures.push(WorkerFailure {
            worker: 1,
            error: "Storage error: disk I/O error".to_string(),
        });
        assert!(!report.is_success());
        assert!(report.summary().contains("Worker 1 failed"));
    }
}
