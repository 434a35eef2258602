//! Storage interface consumed by the ingestion core
//!
//! The engine, writer and coordinator only talk to persistence through
//! [`CustomerStore`] and [`JobStore`]. [`postgres`] backs them with sqlx;
//! [`memory`] keeps everything in process for tests and dry runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use super::models::{CustomerRecord, ImportJob, NewImportJob};

pub use memory::MemoryStore;
pub use postgres::{PgCustomerStore, PgJobStore};

/// Store collaborator failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The store could not be reached; the operation may succeed if retried
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Classify a sqlx error, surfacing unique violations separately
    pub fn from_sqlx(error: sqlx::Error, context: &str) -> Self {
        if crate::features::shared::error_helpers::is_unique_violation(&error) {
            return Self::UniqueViolation(context.to_string());
        }
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(error.to_string())
            },
            other => Self::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a single-row insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The natural key already existed; nothing was written
    Duplicate,
}

/// Customer persistence as seen by the writer
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Which of `customer_ids` are already persisted
    async fn existing_customer_ids(&self, customer_ids: &[String]) -> StoreResult<HashSet<String>>;

    /// Insert all records in one atomic statement, skipping natural-key conflicts
    ///
    /// Returns the number of rows actually written. Either every non-conflicting
    /// row is persisted or none are.
    async fn insert_batch(&self, records: &[CustomerRecord]) -> StoreResult<u64>;

    /// Insert one record, reporting a natural-key conflict as a duplicate
    async fn insert_one(&self, record: &CustomerRecord) -> StoreResult<InsertOutcome>;
}

/// Import job persistence
///
/// Terminal transitions (`complete`, `fail`) only apply to a job that is still
/// `IN_PROGRESS`; they return `false` when nothing changed.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_in_progress(&self) -> StoreResult<Option<ImportJob>>;

    /// Create a job in `IN_PROGRESS` with `started_at = now` and zero processed rows
    ///
    /// Fails with [`StoreError::UniqueViolation`] when another job is already
    /// in progress.
    async fn create(&self, job: NewImportJob) -> StoreResult<ImportJob>;

    /// Most recently created job
    async fn latest(&self) -> StoreResult<Option<ImportJob>>;

    async fn get(&self, job_id: Uuid) -> StoreResult<Option<ImportJob>>;

    /// Atomically add `rows` to `processed_rows` and return the new value
    async fn increment_processed(&self, job_id: Uuid, rows: i64) -> StoreResult<i64>;

    async fn complete(&self, job_id: Uuid) -> StoreResult<bool>;

    async fn fail(&self, job_id: Uuid, error: &str) -> StoreResult<bool>;

    /// Fail every job still `IN_PROGRESS` and return their ids
    ///
    /// Used at startup, when no worker of this process can own them.
    async fn fail_in_progress(&self, error: &str) -> StoreResult<Vec<Uuid>>;
}
