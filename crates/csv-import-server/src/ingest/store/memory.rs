//! In-process store
//!
//! Implements both store traits over plain collections behind a tokio mutex.
//! It enforces the same rules as the Postgres schema: unique customer ids, a
//! single `IN_PROGRESS` job, no transition out of a terminal state. Insert
//! failures and latency can be injected to exercise retry and backpressure.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CustomerStore, InsertOutcome, JobStore, StoreError, StoreResult};
use crate::ingest::models::{CustomerRecord, ImportJob, ImportStatus, NewImportJob};

#[derive(Default)]
struct State {
    customers: HashMap<String, CustomerRecord>,
    /// Creation order; the last entry is the latest job
    jobs: Vec<ImportJob>,
}

#[derive(Default)]
struct Faults {
    failing_inserts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    insert_calls: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
    insert_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every insert call
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    /// Make the next `n` insert calls fail with [`StoreError::Unavailable`]
    pub fn fail_next_inserts(&self, n: usize) {
        self.faults.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// Highest number of insert calls observed running at once
    pub fn max_concurrent_inserts(&self) -> usize {
        self.faults.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.faults.insert_calls.load(Ordering::SeqCst)
    }

    pub async fn customer_count(&self) -> usize {
        self.state.lock().await.customers.len()
    }

    pub async fn customer(&self, customer_id: &str) -> Option<CustomerRecord> {
        self.state.lock().await.customers.get(customer_id).cloned()
    }

    /// Persist a record directly, bypassing fault injection
    pub async fn seed_customer(&self, record: CustomerRecord) {
        self.state
            .lock()
            .await
            .customers
            .entry(record.customer_id.clone())
            .or_insert(record);
    }

    pub async fn job_count(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    async fn begin_insert(&self) -> StoreResult<InsertGuard<'_>> {
        self.faults.insert_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.faults.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.faults.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InsertGuard {
            faults: &self.faults,
        };

        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let injected = self
            .faults
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected insert failure".to_string()));
        }

        Ok(guard)
    }
}

struct InsertGuard<'a> {
    faults: &'a Faults,
}

impl Drop for InsertGuard<'_> {
    fn drop(&mut self) {
        self.faults.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn existing_customer_ids(&self, customer_ids: &[String]) -> StoreResult<HashSet<String>> {
        let state = self.state.lock().await;
        Ok(customer_ids
            .iter()
            .filter(|id| state.customers.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, records: &[CustomerRecord]) -> StoreResult<u64> {
        let _guard = self.begin_insert().await?;
        let mut state = self.state.lock().await;

        let mut inserted = 0;
        for record in records {
            if !state.customers.contains_key(&record.customer_id) {
                state
                    .customers
                    .insert(record.customer_id.clone(), record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_one(&self, record: &CustomerRecord) -> StoreResult<InsertOutcome> {
        let _guard = self.begin_insert().await?;
        let mut state = self.state.lock().await;

        if state.customers.contains_key(&record.customer_id) {
            return Ok(InsertOutcome::Duplicate);
        }
        state
            .customers
            .insert(record.customer_id.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn find_in_progress(&self) -> StoreResult<Option<ImportJob>> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .iter()
            .find(|j| j.status == ImportStatus::InProgress)
            .cloned())
    }

    async fn create(&self, job: NewImportJob) -> StoreResult<ImportJob> {
        let mut state = self.state.lock().await;

        if state.jobs.iter().any(|j| j.status == ImportStatus::InProgress) {
            return Err(StoreError::UniqueViolation(
                "an import is already in progress".to_string(),
            ));
        }

        let now = Utc::now();
        let created = ImportJob {
            id: Uuid::new_v4(),
            file_path: job.file_path,
            status: ImportStatus::InProgress,
            started_at: Some(now),
            finished_at: None,
            total_rows: job.total_rows,
            processed_rows: 0,
            error: None,
            created_at: now,
        };
        state.jobs.push(created.clone());
        Ok(created)
    }

    async fn latest(&self) -> StoreResult<Option<ImportJob>> {
        Ok(self.state.lock().await.jobs.last().cloned())
    }

    async fn get(&self, job_id: Uuid) -> StoreResult<Option<ImportJob>> {
        let state = self.state.lock().await;
        Ok(state.jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn increment_processed(&self, job_id: Uuid, rows: i64) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| StoreError::NotFound(format!("Import job '{}'", job_id)))?;

        job.processed_rows += rows;
        Ok(job.processed_rows)
    }

    async fn complete(&self, job_id: Uuid) -> StoreResult<bool> {
        self.finish(job_id, ImportStatus::Completed, None).await
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> StoreResult<bool> {
        self.finish(job_id, ImportStatus::Failed, Some(error.to_string()))
            .await
    }

    async fn fail_in_progress(&self, error: &str) -> StoreResult<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let mut failed = Vec::new();
        for job in state
            .jobs
            .iter_mut()
            .filter(|j| j.status == ImportStatus::InProgress)
        {
            job.status = ImportStatus::Failed;
            job.finished_at = Some(now);
            job.error = Some(error.to_string());
            failed.push(job.id);
        }
        Ok(failed)
    }
}

impl MemoryStore {
    async fn finish(&self, job_id: Uuid, status: ImportStatus, error: Option<String>) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| StoreError::NotFound(format!("Import job '{}'", job_id)))?;

        if job.status != ImportStatus::InProgress {
            return Ok(false);
        }
        job.status = status;
        job.finished_at = Some(Utc::now());
        job.error = error;
        Ok(true)
    }
}
