//! Data models for imports
//!
//! The customer record produced by the transformer and the import job record
//! that tracks one ingestion run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an import job
///
/// `InProgress` is the only non-terminal state; a job never leaves
/// `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    InProgress,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::InProgress => "IN_PROGRESS",
            ImportStatus::Completed => "COMPLETED",
            ImportStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportStatus::InProgress)
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(ImportStatus::InProgress),
            "COMPLETED" => Ok(ImportStatus::Completed),
            "FAILED" => Ok(ImportStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid import status: {}", s)),
        }
    }
}

/// Import job record (maps to the `import_jobs` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub file_path: String,
    pub status: ImportStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Configured estimate, not an exact count
    pub total_rows: i64,
    /// Rows attempted so far, duplicates included; only ever increases
    pub processed_rows: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImportJob {
    pub file_path: String,
    pub total_rows: i64,
}

/// Normalized customer row
///
/// `customer_id` is the natural key. Optional text fields default to an empty
/// string rather than null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone1: String,
    pub phone2: String,
    pub company: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub subscription_date: NaiveDate,
    pub website: String,
    pub description: String,
    pub import_job_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_status_round_trips_through_str() {
        for status in [ImportStatus::InProgress, ImportStatus::Completed, ImportStatus::Failed] {
            assert_eq!(status.as_str().parse::<ImportStatus>().unwrap(), status);
        }
        assert!("RUNNING".parse::<ImportStatus>().is_err());
    }

    #[test]
    fn test_import_status_terminal_states() {
        assert!(!ImportStatus::InProgress.is_terminal());
        assert!(ImportStatus::Completed.is_terminal());
        assert!(ImportStatus::Failed.is_terminal());
    }

    #[test]
    fn test_import_status_serializes_screaming_case() {
        let json = serde_json::to_string(&ImportStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
