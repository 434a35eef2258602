//! Job coordinator
//!
//! Starts imports under the single-flight rule and answers progress queries.
//!
//! The in-progress check and the job insert are two statements, so two racing
//! starts can both pass the check. The partial unique index on
//! `import_jobs(status)` rejects the loser, which surfaces here as a conflict.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::config::IngestConfig;
use super::jobs::CsvImportJob;
use super::models::{ImportJob, ImportStatus, NewImportJob};
use super::queue::{QueueError, WorkQueue};
use super::store::{JobStore, StoreError};

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("An import is already in progress")]
    Conflict { job_id: Option<Uuid> },

    #[error("No import job found")]
    NotFound,

    #[error("Failed to dispatch import job: {0}")]
    Queue(#[from] QueueError),

    #[error("Import job store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(_) => CoordinatorError::Conflict { job_id: None },
            other => CoordinatorError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedImport {
    pub job_id: Uuid,
    pub status: ImportStatus,
    pub file_path: String,
}

/// Metrics derived from a job's counters at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressMetrics {
    /// Rounded to two decimals
    pub percentage: f64,
    pub elapsed_seconds: i64,
    pub rate_rows_per_sec: i64,
    pub eta_seconds: i64,
}

/// Derive progress metrics from the raw counters
///
/// A job without a start time is treated as having run for one second.
pub fn derive_progress(
    processed_rows: i64,
    total_rows: i64,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ProgressMetrics {
    let percentage = if total_rows > 0 {
        round2(processed_rows as f64 / total_rows as f64 * 100.0)
    } else {
        0.0
    };

    let elapsed_seconds = started_at
        .map(|started| (now - started).num_seconds())
        .unwrap_or(0)
        .max(1);

    let rate_rows_per_sec = (processed_rows as f64 / elapsed_seconds as f64).round() as i64;

    let eta_seconds = if rate_rows_per_sec > 0 {
        let remaining = (total_rows - processed_rows).max(0);
        (remaining as f64 / rate_rows_per_sec as f64).ceil() as i64
    } else {
        0
    };

    ProgressMetrics {
        percentage,
        elapsed_seconds,
        rate_rows_per_sec,
        eta_seconds,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Progress of the most recent import, as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub job_id: Uuid,
    pub status: ImportStatus,
    pub processed_rows: i64,
    pub total_rows: i64,
    pub percentage: f64,
    pub rate: String,
    pub elapsed_time: String,
    pub eta: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ProgressView {
    pub fn from_job(job: &ImportJob, now: DateTime<Utc>) -> Self {
        let metrics = derive_progress(job.processed_rows, job.total_rows, job.started_at, now);

        Self {
            job_id: job.id,
            status: job.status,
            processed_rows: job.processed_rows,
            total_rows: job.total_rows,
            percentage: metrics.percentage,
            rate: format!("{} rows/sec", metrics.rate_rows_per_sec),
            elapsed_time: format!("{}s", metrics.elapsed_seconds),
            eta: format!("{}s", metrics.eta_seconds),
            started_at: job.started_at,
            finished_at: job.finished_at,
            error: job.error.clone(),
        }
    }
}

pub struct JobCoordinator {
    jobs: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    default_file_path: String,
    total_rows: i64,
}

impl JobCoordinator {
    pub fn new(jobs: Arc<dyn JobStore>, queue: Arc<dyn WorkQueue>, config: &IngestConfig) -> Self {
        Self {
            jobs,
            queue,
            default_file_path: config.csv_file_path.clone(),
            total_rows: config.total_rows,
        }
    }

    /// Create a job and hand it to the work queue
    ///
    /// Returns as soon as the job is queued. A blank `file_path` falls back to
    /// the configured default.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, file_path: Option<String>) -> Result<StartedImport, CoordinatorError> {
        if let Some(running) = self.jobs.find_in_progress().await? {
            return Err(CoordinatorError::Conflict {
                job_id: Some(running.id),
            });
        }

        let file_path = file_path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.default_file_path.clone());

        let job = self
            .jobs
            .create(NewImportJob {
                file_path: file_path.clone(),
                total_rows: self.total_rows,
            })
            .await?;

        if let Err(e) = self
            .queue
            .enqueue(CsvImportJob::new(job.id, file_path.clone()))
            .await
        {
            error!(job_id = %job.id, error = %e, "Could not dispatch import job");
            if let Err(update) = self.jobs.fail(job.id, &e.to_string()).await {
                error!(job_id = %job.id, error = %update, "Could not mark import job as failed");
            }
            return Err(e.into());
        }

        info!(job_id = %job.id, file_path = %file_path, "Import job started");

        Ok(StartedImport {
            job_id: job.id,
            status: job.status,
            file_path,
        })
    }

    /// Fail jobs left `IN_PROGRESS` by a previous process
    ///
    /// Must run before any job is submitted in this process. Without it a job
    /// orphaned by a crash or an expired shutdown timeout would hold the
    /// single-flight slot forever.
    pub async fn recover(&self) -> Result<usize, CoordinatorError> {
        let failed = self
            .jobs
            .fail_in_progress("Import was interrupted by a server restart")
            .await
            .map_err(CoordinatorError::Store)?;

        for job_id in &failed {
            warn!(job_id = %job_id, "Marked interrupted import job as failed");
        }
        Ok(failed.len())
    }

    /// Progress of the most recently created job
    pub async fn get_progress(&self) -> Result<ProgressView, CoordinatorError> {
        let job = self
            .jobs
            .latest()
            .await?
            .ok_or(CoordinatorError::NotFound)?;

        Ok(ProgressView::from_job(&job, Utc::now()))
    }
}
