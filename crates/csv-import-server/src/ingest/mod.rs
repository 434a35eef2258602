//! CSV ingestion pipeline
//!
//! # Architecture
//!
//! - **transform**: raw CSV row to [`models::CustomerRecord`], never fails
//! - **batch**: fixed-size [`batch::BatchAccumulator`]
//! - **writer**: deduplicating batch writer with retry and atomic progress
//! - **engine**: streaming reader with backpressure; finalizes the job
//! - **coordinator**: single-flight start and progress reporting
//! - **queue**: in-process work queue and its single worker
//! - **store**: storage traits with Postgres and in-memory backends
//!
//! # Public API
//!
//! The HTTP endpoints are provided through the `features::imports` module:
//! - `POST /api/v1/import/sync` - Start an import
//! - `GET /api/v1/import/progress` - Progress of the latest import

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod jobs;
pub mod models;
pub mod queue;
pub mod store;
pub mod transform;
pub mod writer;

pub use batch::{Batch, BatchAccumulator};
pub use config::{DedupStrategy, IngestConfig, RetryPolicy};
pub use coordinator::{CoordinatorError, JobCoordinator, ProgressView, StartedImport};
pub use engine::{IngestionEngine, IngestionError};
pub use jobs::{CsvImportJob, IngestStats};
pub use models::{CustomerRecord, ImportJob, ImportStatus};
pub use queue::{LocalWorkQueue, ProgressReporter, WorkEvent, WorkQueue, WorkerHandle};
pub use store::{CustomerStore, JobStore, MemoryStore, PgCustomerStore, PgJobStore, StoreError};
pub use writer::{DedupWriter, WriteError, WriteResult};
