use std::path::Path;

use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::config::Settings;
use crate::error::{IngestError, Result};
use crate::models::{LedgerStatus, SourceIdentifier};
use crate::processors::batch_loader::BatchLoader;
use crate::processors::schema_registry::SchemaRegistry;
use crate::processors::work_queue::{WorkItem, WorkQueue};
use crate::readers::{decode_payload, ObservationReader, PayloadFetcher};
use crate::store::{self, DedupLedger};
use crate::utils::constants::WEATHER_TABLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingWork,
    Processing,
    Draining,
    Terminated,
}

/// What happened to one dequeued identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Found in the ledger, or reserved by a peer first
    AlreadyIngested,
    Complete { rows: u64 },
    Partial { rows: u64, reason: String },
    Rejected { reason: String },
    /// Reservation released; a later run retries it
    FetchFailed { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub dequeued: u64,
    pub skipped: u64,
    pub complete: u64,
    pub partial: u64,
    pub rejected: u64,
    pub fetch_failed: u64,
    pub rows_loaded: u64,
    pub columns_added: u64,
}

impl WorkerStats {
    pub fn record(&mut self, outcome: &FileOutcome) {
        self.dequeued += 1;
        match outcome {
            FileOutcome::AlreadyIngested => self.skipped += 1,
            FileOutcome::Complete { rows } => {
                self.complete += 1;
                self.rows_loaded += rows;
            }
            FileOutcome::Partial { rows, .. } => {
                self.partial += 1;
                self.rows_loaded += rows;
            }
            FileOutcome::Rejected { .. } => self.rejected += 1,
            FileOutcome::FetchFailed { .. } => self.fetch_failed += 1,
        }
    }

    pub fn merge(&mut self, other: &WorkerStats) {
        self.dequeued += other.dequeued;
        self.skipped += other.skipped;
        self.complete += other.complete;
        self.partial += other.partial;
        self.rejected += other.rejected;
        self.fetch_failed += other.fetch_failed;
        self.rows_loaded += other.rows_loaded;
        self.columns_added += other.columns_added;
    }
}

/// Everything one worker owns for its whole lifetime: a storage connection,
/// its ledger snapshot, its view of the table columns and a fetcher.
/// Nothing here is shared with other workers.
pub struct WorkerContext<F: PayloadFetcher> {
    id: usize,
    conn: Connection,
    ledger: DedupLedger,
    registry: SchemaRegistry,
    fetcher: F,
    batch_size: usize,
    state: WorkerState,
    stats: WorkerStats,
}

impl<F: PayloadFetcher> WorkerContext<F> {
    /// Open the worker's connection and take the ledger snapshot.
    pub fn open(id: usize, settings: &Settings, fetcher: F) -> Result<Self> {
        let conn = store::open(Path::new(&settings.database_path), settings.busy_timeout())?;
        let ledger = DedupLedger::load(&conn)?;
        let mut registry = SchemaRegistry::new(WEATHER_TABLE);
        registry.refresh(&conn)?;

        Ok(Self {
            id,
            conn,
            ledger,
            registry,
            fetcher,
            batch_size: settings.batch_size,
            state: WorkerState::AwaitingWork,
            stats: WorkerStats::default(),
        })
    }

    /// Work the queue until the shutdown token shows up.
    ///
    /// The token is pushed back before returning so every peer sees it.
    /// Storage errors end the worker; the identifier being processed keeps
    /// its `in_progress` reservation until the next run reclaims it.
    pub fn run(mut self, queue: &WorkQueue) -> Result<WorkerStats> {
        let span = info_span!("worker", id = self.id);
        let _enter = span.enter();
        debug!(snapshot = self.ledger.snapshot_len(), "Worker started");

        loop {
            self.transition(WorkerState::AwaitingWork);
            match queue.pop()? {
                WorkItem::Shutdown => {
                    self.transition(WorkerState::Draining);
                    queue.shutdown()?;
                    break;
                }
                WorkItem::Source(identifier) => {
                    self.transition(WorkerState::Processing);
                    let outcome = self.process(&identifier).map_err(|e| {
                        error!(%identifier, error = %e, "Worker stopping");
                        e
                    })?;
                    self.stats.record(&outcome);
                }
            }
        }

        self.transition(WorkerState::Terminated);
        info!(
            files = self.stats.dequeued,
            complete = self.stats.complete,
            skipped = self.stats.skipped,
            rows = self.stats.rows_loaded,
            "Worker finished"
        );
        Ok(self.stats)
    }

    /// Dedup, reserve, fetch and load one identifier.
    pub fn process(&mut self, identifier: &SourceIdentifier) -> Result<FileOutcome> {
        if self.ledger.contains(&self.conn, identifier)? {
            debug!(%identifier, "Already ingested");
            return Ok(FileOutcome::AlreadyIngested);
        }

        if !self.ledger.reserve(&self.conn, identifier)? {
            debug!(%identifier, "Reserved by a peer");
            return Ok(FileOutcome::AlreadyIngested);
        }

        let payload = match self.fetcher.fetch(identifier) {
            Ok(payload) => payload,
            Err(e) => {
                error!(%identifier, error = %e, "Fetch failed; reservation released");
                self.ledger.release(&self.conn, identifier)?;
                return Ok(FileOutcome::FetchFailed {
                    reason: e.to_string(),
                });
            }
        };

        let text = match decode_payload(&payload) {
            Some(text) => text,
            None => {
                let reason = IngestError::Encoding {
                    identifier: identifier.to_string(),
                }
                .to_string();
                return self.reject(identifier, reason);
            }
        };

        self.load(identifier, &text)
    }

    fn load(&mut self, identifier: &SourceIdentifier, text: &str) -> Result<FileOutcome> {
        let mut reader = match ObservationReader::new(text.as_bytes()) {
            Ok(reader) => reader,
            Err(e) => return self.reject(identifier, e.to_string()),
        };

        let added = self
            .registry
            .ensure_columns(&self.conn, reader.layout().columns())?;
        self.stats.columns_added += added.len() as u64;
        let columns = reader.layout().insert_columns();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (rows, failure) = {
            let mut loader = BatchLoader::new(&tx, WEATHER_TABLE, columns, self.batch_size)?;
            let mut failure = None;

            for row in reader.rows() {
                if let Err(e) = row.and_then(|row| loader.push(row)) {
                    failure = Some(e);
                    break;
                }
            }

            let failure = match failure {
                None => loader.finish().err(),
                Some(e) => {
                    let dropped = loader.discard();
                    debug!(%identifier, dropped, "Unflushed rows dropped");
                    Some(e)
                }
            };
            (loader.rows_loaded(), failure)
        };

        let (status, outcome) = match failure {
            None => (LedgerStatus::Complete, FileOutcome::Complete { rows }),
            // SQLite rolled the whole transaction back (disk full, I/O error,
            // RAISE(ROLLBACK)); nothing of this file is stored and the
            // reservation stays in_progress
            Some(e) if tx.is_autocommit() => {
                error!(%identifier, rows, error = %e, "Load transaction rolled back");
                return Err(e);
            }
            Some(e) => {
                warn!(%identifier, rows, error = %e, "Stopped early; loaded batches kept");
                (
                    LedgerStatus::Partial,
                    FileOutcome::Partial {
                        rows,
                        reason: e.to_string(),
                    },
                )
            }
        };

        DedupLedger::finalize(&tx, identifier, status, rows)?;
        tx.commit()?;

        debug!(file = identifier.file_name(), rows, %status, "File committed");
        Ok(outcome)
    }

    fn reject(&mut self, identifier: &SourceIdentifier, reason: String) -> Result<FileOutcome> {
        warn!(%identifier, %reason, "File rejected");
        DedupLedger::finalize(&self.conn, identifier, LedgerStatus::Rejected, 0)?;
        Ok(FileOutcome::Rejected { reason })
    }

    fn transition(&mut self, next: WorkerState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Worker state");
            self.state = next;
        }
    }
}
