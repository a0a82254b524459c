//! Health endpoints for the Broadcast Controller.
//!
//! - `GET /health` - Liveness check (is the process running?)
//! - `GET /ready` - Readiness check (can we start sessions?)
//!
//! The controller is ready when it has not begun shutting down and at least
//! one broadcaster worker is connected. Readiness answers with a small JSON
//! body so operators can tell the two conditions apart.

use crate::services::worker_pool::WorkerPool;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Health state for the Broadcast Controller.
pub struct HealthState {
    /// Always true after startup.
    live: AtomicBool,
    /// Cleared when shutdown begins.
    accepting: AtomicBool,
    pool: Arc<dyn WorkerPool>,
}

impl HealthState {
    /// Create a new health state (live, accepting) over `pool`.
    #[must_use]
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            live: AtomicBool::new(true),
            accepting: AtomicBool::new(true),
            pool,
        }
    }

    /// Stop reporting ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Accepting sessions and a worker is connected.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness().ready
    }

    fn readiness(&self) -> Readiness {
        let accepting = self.accepting.load(Ordering::SeqCst);
        let workers_connected = self.pool.any_connected();
        Readiness {
            ready: accepting && workers_connected,
            accepting,
            workers_connected,
        }
    }
}

#[derive(Debug, Serialize)]
struct Readiness {
    ready: bool,
    accepting: bool,
    workers_connected: bool,
}

/// Create the health router with liveness and readiness endpoints.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(
    State(state): State<Arc<HealthState>>,
) -> (StatusCode, Json<Readiness>) {
    let readiness = state.readiness();
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}
