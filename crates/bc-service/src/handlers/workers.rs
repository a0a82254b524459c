//! Worker presence handlers.
//!
//! - `PUT /v1/workers/:id` - Register a worker, or refresh its endpoint
//! - `PUT /v1/workers/:id/status` - Record a status reported by a worker
//! - `DELETE /v1/workers/:id` - Remove a worker from the pool
//!
//! Workers report BUSY here while running a session and IDLE when done, so
//! selection skips them without waiting for a failed start.

use crate::errors::BcError;
use crate::routes::AppState;
use crate::services::WorkerStatus;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use common::types::WorkerId;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Request body for `PUT /v1/workers/:id`.
#[derive(Debug, Deserialize)]
pub struct RegisterWorkerBody {
    pub endpoint: String,
    #[serde(default = "idle")]
    pub status: WorkerStatus,
}

fn idle() -> WorkerStatus {
    WorkerStatus::Idle
}

/// Request body for `PUT /v1/workers/:id/status`.
#[derive(Debug, Deserialize)]
pub struct WorkerStatusBody {
    pub status: WorkerStatus,
}

fn worker_id(raw: String) -> Result<WorkerId, BcError> {
    if raw.trim().is_empty() {
        return Err(BcError::BadRequest("worker id must not be empty".to_string()));
    }
    Ok(WorkerId::new(raw))
}

/// Handler for PUT /v1/workers/:id
///
/// - 204 No Content: Worker registered
/// - 400 Bad Request: Endpoint is not an http(s) URL
#[instrument(skip_all, fields(worker = %id))]
pub async fn register_worker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RegisterWorkerBody>,
) -> Result<StatusCode, BcError> {
    let id = worker_id(id)?;
    let endpoint = body.endpoint.trim();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(BcError::BadRequest(
            "endpoint must be an http(s) URL".to_string(),
        ));
    }

    state.presence.add_worker(
        id,
        endpoint.trim_end_matches('/').to_string(),
        body.status,
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PUT /v1/workers/:id/status
///
/// - 204 No Content: Status recorded
/// - 404 Not Found: Worker is not in the pool
#[instrument(skip_all, fields(worker = %id, status = ?body.status))]
pub async fn update_worker_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<WorkerStatusBody>,
) -> Result<StatusCode, BcError> {
    let id = worker_id(id)?;
    if state.presence.update_status(&id, body.status) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BcError::NotFound(format!("worker {id} is not registered")))
    }
}

/// Handler for DELETE /v1/workers/:id
#[instrument(skip_all, fields(worker = %id))]
pub async fn remove_worker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, BcError> {
    let id = worker_id(id)?;
    if state.presence.remove_worker(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BcError::NotFound(format!("worker {id} is not registered")))
    }
}
