//! Import API routes
//!
//! - `POST /api/v1/import/sync` - Start an import of the configured or given CSV file
//! - `GET /api/v1/import/progress` - Progress of the latest import
//!
//! Success bodies are returned unwrapped; errors use the standard error envelope.

use crate::api::response::ErrorResponse;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use super::{
    commands::{StartImportCommand, StartImportError},
    queries::{GetImportProgressError, GetImportProgressQuery},
};
use crate::ingest::JobCoordinator;

pub fn imports_routes() -> Router<Arc<JobCoordinator>> {
    Router::new()
        .route("/sync", post(start_import))
        .route("/progress", get(get_progress))
}

/// `POST /api/v1/import/sync`
///
/// The body is optional; without one the configured file is imported.
///
/// - `200 OK` - `{ jobId, status, message }`
/// - `400 Bad Request` - An import is already in progress, or the body is not valid JSON
/// - `503 Service Unavailable` - The work queue did not accept the job
#[tracing::instrument(skip(coordinator, body))]
async fn start_import(
    State(coordinator): State<Arc<JobCoordinator>>,
    body: Bytes,
) -> Result<Response, ImportsApiError> {
    let command = parse_command(&body)?;
    let response = super::commands::start_import::handle(coordinator, command).await?;

    tracing::info!(job_id = %response.job_id, "Import started via API");

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// `GET /api/v1/import/progress`
///
/// - `200 OK` - Progress view of the latest job
/// - `400 Bad Request` - No import has ever been started
#[tracing::instrument(skip(coordinator))]
async fn get_progress(
    State(coordinator): State<Arc<JobCoordinator>>,
) -> Result<Response, ImportsApiError> {
    let view = super::queries::get_progress::handle(coordinator, GetImportProgressQuery).await?;
    Ok((StatusCode::OK, Json(view)).into_response())
}

/// An empty or whitespace-only body means "use the defaults"
fn parse_command(body: &[u8]) -> Result<StartImportCommand, ImportsApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartImportCommand::default());
    }
    serde_json::from_slice(body).map_err(|e| ImportsApiError::InvalidBody(e.to_string()))
}

#[derive(Debug)]
enum ImportsApiError {
    InvalidBody(String),
    Start(StartImportError),
    Progress(GetImportProgressError),
}

impl From<StartImportError> for ImportsApiError {
    fn from(err: StartImportError) -> Self {
        Self::Start(err)
    }
}

impl From<GetImportProgressError> for ImportsApiError {
    fn from(err: GetImportProgressError) -> Self {
        Self::Progress(err)
    }
}

impl IntoResponse for ImportsApiError {
    fn into_response(self) -> Response {
        match self {
            ImportsApiError::InvalidBody(msg) => {
                let error = ErrorResponse::new(
                    "VALIDATION_ERROR",
                    format!("Invalid request body: {}", msg),
                );
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            ImportsApiError::Start(StartImportError::AlreadyRunning { job_id }) => {
                let error = match job_id {
                    Some(id) => ErrorResponse::with_details(
                        "CONFLICT",
                        "An import job is already in progress.",
                        serde_json::json!({ "jobId": id }),
                    ),
                    None => ErrorResponse::new("CONFLICT", "An import job is already in progress."),
                };
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            ImportsApiError::Start(StartImportError::Dispatch(msg)) => {
                tracing::error!("Import dispatch failed: {}", msg);
                let error = ErrorResponse::new("QUEUE_UNAVAILABLE", "The import queue is unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, Json(error)).into_response()
            },
            ImportsApiError::Progress(GetImportProgressError::NoJobs) => {
                let error = ErrorResponse::new("NOT_FOUND", "No import job found.");
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            ImportsApiError::Start(StartImportError::Store(msg))
            | ImportsApiError::Progress(GetImportProgressError::Store(msg)) => {
                tracing::error!("Import job store error: {}", msg);
                let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}
