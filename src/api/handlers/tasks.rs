use axum::{extract::State, Json};
use serde::Deserialize;

use crate::agents::{BatchResult, TaskOutcome, TaskRequest};
use crate::api::errors::ApiError;
use crate::api::AppState;

/// Largest batch accepted in one request
pub const MAX_BATCH_TASKS: usize = 32;

/// Request body for a batch submission
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub tasks: Vec<TaskRequest>,
}

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// Run a single task
///
/// POST /api/tasks
///
/// Agent failures are part of the outcome, not an error status.
pub async fn submit_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Json<TaskOutcome> {
    Json(state.coordinator.process_request(req).await)
}

/// Run a batch of tasks concurrently
///
/// POST /api/tasks/batch
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResult>, ApiError> {
    if req.tasks.len() > MAX_BATCH_TASKS {
        return Err(ApiError::bad_request(format!(
            "Batch has {} tasks, at most {} are allowed",
            req.tasks.len(),
            MAX_BATCH_TASKS
        )));
    }

    tracing::info!(tasks = req.tasks.len(), "batch submitted");
    Ok(Json(state.coordinator.process_requests(req.tasks).await))
}
