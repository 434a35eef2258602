//! Job definitions for CSV ingestion
//!
//! The payload handed to the work queue and the statistics an ingestion run
//! produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// CSV import job payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportJob {
    /// Import job row this run belongs to
    pub job_id: Uuid,
    /// Source file to stream
    pub file_path: String,
    /// Timestamp when the job was enqueued
    pub enqueued_at: DateTime<Utc>,
}

impl CsvImportJob {
    pub fn new(job_id: Uuid, file_path: impl Into<String>) -> Self {
        Self {
            job_id,
            file_path: file_path.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// Statistics collected during one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Data rows read from the source, header excluded
    pub rows_read: i64,
    /// Rows newly persisted
    pub rows_inserted: i64,
    /// Rows skipped because the customer id already existed
    pub rows_skipped: i64,
    /// Rows that needed a default substituted
    pub rows_with_warnings: i64,
    /// Rows dropped because they had no customer id
    pub rows_rejected: i64,
    /// Batches handed to the writer
    pub batches_written: u64,
    pub duration_secs: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IngestStats {
    /// Rows per second over the whole run
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.rows_read as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}
