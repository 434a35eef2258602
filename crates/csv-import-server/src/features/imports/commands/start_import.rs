//! Start import command

use mediator::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::ingest::{CoordinatorError, ImportStatus, JobCoordinator};

/// Body of `POST /import/sync`
///
/// A missing or blank `filePath` falls back to the configured CSV file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImportCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImportResponse {
    pub job_id: Uuid,
    pub status: ImportStatus,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StartImportError {
    #[error("An import job is already in progress")]
    AlreadyRunning { job_id: Option<Uuid> },

    #[error("Import could not be dispatched: {0}")]
    Dispatch(String),

    #[error("Import job store error: {0}")]
    Store(String),
}

impl From<CoordinatorError> for StartImportError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Conflict { job_id } => Self::AlreadyRunning { job_id },
            CoordinatorError::Queue(e) => Self::Dispatch(e.to_string()),
            other => Self::Store(other.to_string()),
        }
    }
}

impl Request<Result<StartImportResponse, StartImportError>> for StartImportCommand {}

impl crate::cqrs::middleware::Command for StartImportCommand {}

#[tracing::instrument(skip(coordinator, command), fields(file_path = ?command.file_path))]
pub async fn handle(
    coordinator: Arc<JobCoordinator>,
    command: StartImportCommand,
) -> Result<StartImportResponse, StartImportError> {
    let started = coordinator.start(command.file_path).await?;

    Ok(StartImportResponse {
        job_id: started.job_id,
        status: started.status,
        message: "Import started successfully".to_string(),
    })
}
