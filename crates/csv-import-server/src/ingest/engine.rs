//! Streaming ingestion engine
//!
//! Reads the source file forward-only, one record at a time, and drives each
//! record through the transformer and the batch accumulator. When a batch
//! fills, the engine awaits the writer before pulling the next record, so at
//! most one batch is buffered and writes happen in read order.
//!
//! The run ends in exactly one terminal job state: `COMPLETED` after the final
//! partial batch is flushed, or `FAILED` with the error message when anything
//! fatal happens. Failures are also returned to the caller.

use chrono::Utc;
use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::batch::{Batch, BatchAccumulator};
use super::config::IngestConfig;
use super::jobs::IngestStats;
use super::queue::ProgressReporter;
use super::store::{CustomerStore, JobStore, StoreError};
use super::transform::{transform_with_warnings, CsvRow, HeaderIndex, HEADER_CUSTOMER_ID};
use super::writer::{DedupWriter, WriteError};

/// Transform warnings logged one by one before switching to a summary
const LOGGED_WARNING_LIMIT: u64 = 10;

/// Fatal errors that end a run
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Source file '{path}' could not be opened: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV stream{}: {message}", at_line(.line))]
    MalformedStream { line: Option<u64>, message: String },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Import job update failed: {0}")]
    JobUpdate(#[source] StoreError),
}

fn at_line(line: &Option<u64>) -> String {
    line.map(|l| format!(" at line {l}")).unwrap_or_default()
}

impl IngestionError {
    fn from_csv(e: csv_async::Error) -> Self {
        Self::MalformedStream {
            line: e.position().map(|p| p.line()),
            message: e.to_string(),
        }
    }
}

/// Tracks what has been published so percentages never go backwards
struct ProgressTracker {
    total_rows: i64,
    every_batches: u64,
    last_reported: u8,
}

impl ProgressTracker {
    fn new(total_rows: i64, every_batches: u64) -> Self {
        Self {
            total_rows,
            every_batches: every_batches.max(1),
            last_reported: 0,
        }
    }

    /// Percentage to publish after `batch`, if any
    fn after_batch(&mut self, batch: u64, processed_rows: i64) -> Option<u8> {
        if batch % self.every_batches != 0 {
            return None;
        }
        let pct = percent_of(processed_rows, self.total_rows);
        if pct < self.last_reported {
            return None;
        }
        self.last_reported = pct;
        Some(pct)
    }
}

/// Whole-number percentage clamped to `0..=100`
pub fn percent_of(processed_rows: i64, total_rows: i64) -> u8 {
    if total_rows <= 0 {
        return 0;
    }
    let pct = (processed_rows as f64 / total_rows as f64 * 100.0).floor();
    pct.clamp(0.0, 100.0) as u8
}

pub struct IngestionEngine {
    writer: DedupWriter,
    jobs: Arc<dyn JobStore>,
    batch_size: usize,
    progress_every_batches: u64,
}

impl IngestionEngine {
    pub fn new(customers: Arc<dyn CustomerStore>, jobs: Arc<dyn JobStore>, config: &IngestConfig) -> Self {
        Self {
            writer: DedupWriter::new(
                customers,
                jobs.clone(),
                config.dedup_strategy,
                config.retry.clone(),
            ),
            jobs,
            batch_size: config.batch_size,
            progress_every_batches: config.progress_every_batches,
        }
    }

    /// Ingest `file_path` into the store on behalf of `job_id`
    ///
    /// Finalizes the job before returning. A failure to record the terminal
    /// state is itself reported as [`IngestionError::JobUpdate`].
    #[tracing::instrument(skip(self, reporter), fields(job_id = %job_id))]
    pub async fn run(
        &self,
        file_path: &str,
        job_id: Uuid,
        reporter: &dyn ProgressReporter,
    ) -> Result<IngestStats, IngestionError> {
        let started = Instant::now();
        let mut stats = IngestStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(file_path, batch_size = self.batch_size, "Starting CSV ingestion");

        let outcome = self.stream(file_path, job_id, reporter, &mut stats).await;
        stats.duration_secs = started.elapsed().as_secs_f64();

        match outcome {
            Ok(()) => {
                if let Err(e) = self.jobs.complete(job_id).await {
                    let e = IngestionError::JobUpdate(e);
                    error!(error = %e, "Could not mark import job as completed");
                    self.mark_failed(job_id, &e.to_string()).await;
                    return Err(e);
                }
                reporter.report(job_id, 100).await;
                stats.completed_at = Some(Utc::now());

                info!(
                    rows_read = stats.rows_read,
                    inserted = stats.rows_inserted,
                    skipped = stats.rows_skipped,
                    rejected = stats.rows_rejected,
                    batches = stats.batches_written,
                    rows_per_sec = stats.throughput() as u64,
                    duration_secs = stats.duration_secs,
                    "CSV ingestion completed"
                );
                Ok(stats)
            },
            Err(e) => {
                error!(error = %e, rows_read = stats.rows_read, "CSV ingestion failed");
                self.mark_failed(job_id, &e.to_string()).await;
                Err(e)
            },
        }
    }

    /// Fail a job that will never run, e.g. one still queued at shutdown
    pub async fn abandon(&self, job_id: Uuid, reason: &str) {
        warn!(job_id = %job_id, reason, "Abandoning import job");
        self.mark_failed(job_id, reason).await;
    }

    async fn mark_failed(&self, job_id: Uuid, message: &str) {
        if let Err(update) = self.jobs.fail(job_id, message).await {
            error!(job_id = %job_id, error = %update, "Could not mark import job as failed");
        }
    }

    async fn stream(
        &self,
        file_path: &str,
        job_id: Uuid,
        reporter: &dyn ProgressReporter,
        stats: &mut IngestStats,
    ) -> Result<(), IngestionError> {
        let job = self
            .jobs
            .get(job_id)
            .await
            .map_err(IngestionError::JobUpdate)?
            .ok_or_else(|| {
                IngestionError::JobUpdate(StoreError::NotFound(format!("Import job '{}'", job_id)))
            })?;

        let file = tokio::fs::File::open(file_path)
            .await
            .map_err(|source| IngestionError::SourceUnavailable {
                path: file_path.to_string(),
                source,
            })?;

        let mut reader = AsyncReaderBuilder::new()
            .flexible(true)
            .create_reader(file);

        let headers = reader.headers().await.map_err(IngestionError::from_csv)?;
        let index = HeaderIndex::new(headers.iter());
        if index.position(HEADER_CUSTOMER_ID).is_none() && !headers.is_empty() {
            return Err(IngestionError::MalformedStream {
                line: Some(1),
                message: format!("header row has no '{}' column", HEADER_CUSTOMER_ID),
            });
        }

        let mut accumulator = BatchAccumulator::new(self.batch_size);
        let mut progress = ProgressTracker::new(job.total_rows, self.progress_every_batches);
        // Keyless rows read since the last counter update
        let mut rejected_pending: i64 = 0;
        let mut records = reader.records();

        while let Some(next) = records.next().await {
            let record = next.map_err(IngestionError::from_csv)?;
            stats.rows_read += 1;

            let transformed = transform_with_warnings(
                &CsvRow {
                    index: &index,
                    record: &record,
                },
                job_id,
            );

            if !transformed.warnings.is_empty() {
                stats.rows_with_warnings += 1;
                if stats.rows_with_warnings as u64 <= LOGGED_WARNING_LIMIT {
                    let line = record.position().map(|p| p.line());
                    for warning in &transformed.warnings {
                        warn!(line, customer_id = %transformed.record.customer_id, "{}", warning);
                    }
                }
            }

            // Without a natural key the row cannot be deduplicated, so it is
            // counted as processed but never stored
            if !transformed.has_natural_key() {
                stats.rows_rejected += 1;
                rejected_pending += 1;
                if stats.rows_rejected as u64 <= LOGGED_WARNING_LIMIT {
                    let line = record.position().map(|p| p.line());
                    warn!(line, "Row has no customer id and was not imported");
                }
                continue;
            }

            if let Some(batch) = accumulator.push(transformed.record) {
                // Reading stays suspended until the batch is persisted
                self.write_batch(&batch, job_id, reporter, &mut progress, &mut rejected_pending, stats)
                    .await?;
            }
        }

        if let Some(batch) = accumulator.flush() {
            self.write_batch(&batch, job_id, reporter, &mut progress, &mut rejected_pending, stats)
                .await?;
        }
        self.count_rejected(job_id, &mut rejected_pending).await?;

        if stats.rows_rejected as u64 > LOGGED_WARNING_LIMIT {
            warn!(
                rows_rejected = stats.rows_rejected,
                logged = LOGGED_WARNING_LIMIT,
                "Further rows without a customer id were not logged"
            );
        }

        if stats.rows_with_warnings as u64 > LOGGED_WARNING_LIMIT {
            warn!(
                rows_with_warnings = stats.rows_with_warnings,
                logged = LOGGED_WARNING_LIMIT,
                "Further transform warnings were suppressed"
            );
        }

        Ok(())
    }

    async fn write_batch(
        &self,
        batch: &Batch,
        job_id: Uuid,
        reporter: &dyn ProgressReporter,
        progress: &mut ProgressTracker,
        rejected_pending: &mut i64,
        stats: &mut IngestStats,
    ) -> Result<(), IngestionError> {
        let result = self.writer.write(batch, job_id).await?;

        stats.batches_written += 1;
        stats.rows_inserted += result.inserted_count as i64;
        stats.rows_skipped += result.skipped_count as i64;

        let processed_rows = self
            .count_rejected(job_id, rejected_pending)
            .await?
            .unwrap_or(result.processed_rows);

        if let Some(pct) = progress.after_batch(batch.sequence, processed_rows) {
            info!(
                batch = batch.sequence,
                processed_rows,
                percentage = pct,
                "Import progress"
            );
            reporter.report(job_id, pct).await;
        }

        Ok(())
    }

    /// Add pending keyless rows to the job's processed counter
    ///
    /// Returns the new counter value, or `None` when nothing was pending.
    async fn count_rejected(&self, job_id: Uuid, pending: &mut i64) -> Result<Option<i64>, IngestionError> {
        if *pending == 0 {
            return Ok(None);
        }
        let processed = self
            .jobs
            .increment_processed(job_id, *pending)
            .await
            .map_err(IngestionError::JobUpdate)?;
        *pending = 0;
        Ok(Some(processed))
    }
}
