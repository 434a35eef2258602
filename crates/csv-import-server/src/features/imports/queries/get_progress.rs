use mediator::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ingest::{CoordinatorError, JobCoordinator, ProgressView};

/// Progress of the most recently created import job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetImportProgressQuery;

#[derive(Debug, thiserror::Error)]
pub enum GetImportProgressError {
    #[error("No import job found.")]
    NoJobs,

    #[error("Import job store error: {0}")]
    Store(String),
}

impl From<CoordinatorError> for GetImportProgressError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::NotFound => Self::NoJobs,
            other => Self::Store(other.to_string()),
        }
    }
}

impl Request<Result<ProgressView, GetImportProgressError>> for GetImportProgressQuery {}

impl crate::cqrs::middleware::Query for GetImportProgressQuery {}

#[tracing::instrument(skip_all)]
pub async fn handle(
    coordinator: Arc<JobCoordinator>,
    _query: GetImportProgressQuery,
) -> Result<ProgressView, GetImportProgressError> {
    Ok(coordinator.get_progress().await?)
}
