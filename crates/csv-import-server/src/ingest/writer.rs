//! Deduplicating batch writer
//!
//! Persists only the records of a batch whose customer id is not already
//! stored, then advances the job's processed-row counter by the full batch
//! size. The counter is advanced with a store-level atomic increment after the
//! insert has succeeded; a batch that cannot be persisted never advances it.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::batch::Batch;
use super::config::{DedupStrategy, RetryPolicy};
use super::models::CustomerRecord;
use super::store::{CustomerStore, InsertOutcome, JobStore, StoreError};

#[derive(Error, Debug)]
pub enum WriteError {
    /// Retries exhausted; none of the batch's rows were counted as processed
    #[error("Batch {batch} ({size} rows) could not be persisted after {attempts} attempts: {source}")]
    PartialBatchInsert {
        batch: u64,
        size: usize,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// Rows were persisted but the processed-row counter could not be advanced
    #[error("Failed to advance processed rows for batch {batch}: {source}")]
    Progress {
        batch: u64,
        #[source]
        source: StoreError,
    },
}

/// Outcome of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub inserted_count: u64,
    /// Rows whose customer id already existed, in the store or earlier in the batch
    pub skipped_count: u64,
    /// Job counter after this batch
    #[serde(skip)]
    pub processed_rows: i64,
}

pub struct DedupWriter {
    customers: Arc<dyn CustomerStore>,
    jobs: Arc<dyn JobStore>,
    strategy: DedupStrategy,
    retry: RetryPolicy,
}

impl DedupWriter {
    pub fn new(
        customers: Arc<dyn CustomerStore>,
        jobs: Arc<dyn JobStore>,
        strategy: DedupStrategy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            customers,
            jobs,
            strategy,
            retry,
        }
    }

    /// Write one batch and advance the job counter by its size
    #[tracing::instrument(skip(self, batch), fields(batch = batch.sequence, rows = batch.len()))]
    pub async fn write(&self, batch: &Batch, job_id: Uuid) -> Result<WriteResult, WriteError> {
        if batch.is_empty() {
            return Ok(WriteResult::default());
        }

        let unique = first_occurrences(&batch.records);
        let inserted = self.insert_with_retry(batch, &unique).await?;
        let size = batch.len() as u64;

        let processed_rows = self
            .jobs
            .increment_processed(job_id, size as i64)
            .await
            .map_err(|source| WriteError::Progress {
                batch: batch.sequence,
                source,
            })?;

        let result = WriteResult {
            inserted_count: inserted,
            skipped_count: size - inserted,
            processed_rows,
        };

        debug!(
            inserted = result.inserted_count,
            skipped = result.skipped_count,
            processed_rows,
            "Batch written"
        );

        Ok(result)
    }

    async fn insert_with_retry(&self, batch: &Batch, unique: &[&CustomerRecord]) -> Result<u64, WriteError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let outcome = tokio::time::timeout(self.retry.batch_timeout(), self.insert_new(unique))
                .await
                .unwrap_or_else(|_| {
                    Err(StoreError::Unavailable(format!(
                        "batch write exceeded {}s lease",
                        self.retry.batch_timeout_secs
                    )))
                });

            match outcome {
                Ok(inserted) => return Ok(inserted),
                Err(e) if attempt <= self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        batch = batch.sequence,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Batch insert failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(source) => {
                    error!(
                        batch = batch.sequence,
                        attempts = attempt,
                        first_customer_id = batch
                            .records
                            .first()
                            .map(|r| r.customer_id.as_str())
                            .unwrap_or_default(),
                        error = %source,
                        "Batch insert failed, retries exhausted"
                    );
                    return Err(WriteError::PartialBatchInsert {
                        batch: batch.sequence,
                        size: batch.len(),
                        attempts: attempt,
                        source,
                    });
                },
            }
        }
    }

    async fn insert_new(&self, unique: &[&CustomerRecord]) -> Result<u64, StoreError> {
        match self.strategy {
            DedupStrategy::Bulk => {
                let keys: Vec<String> = unique.iter().map(|r| r.customer_id.clone()).collect();
                let existing = self.customers.existing_customer_ids(&keys).await?;

                let fresh: Vec<CustomerRecord> = unique
                    .iter()
                    .filter(|r| !existing.contains(&r.customer_id))
                    .map(|r| (*r).clone())
                    .collect();

                // Rows that race in between lookup and insert are dropped by the
                // store's conflict clause and counted as skipped
                self.customers.insert_batch(&fresh).await
            },
            DedupStrategy::PerRow => {
                let mut inserted = 0;
                for record in unique {
                    if self.customers.insert_one(record).await? == InsertOutcome::Inserted {
                        inserted += 1;
                    }
                }
                Ok(inserted)
            },
        }
    }
}

/// Records with a customer id not seen earlier in the batch, in order
fn first_occurrences(records: &[CustomerRecord]) -> Vec<&CustomerRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|r| seen.insert(r.customer_id.as_str()))
        .collect()
}
