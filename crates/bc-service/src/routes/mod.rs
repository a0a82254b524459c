//! HTTP routes for the Broadcast Controller.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::observability::{health_router, FailureCounters, HealthState};
use crate::services::{BroadcasterTransport, WorkerPool, WorkerPresence};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers.
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Broadcaster workers sessions are started on.
    pub pool: Arc<dyn WorkerPool>,

    /// Presence side of the same pool, driven by `/v1/workers`.
    pub presence: Arc<dyn WorkerPresence>,

    /// Transport for start requests.
    pub transport: Arc<dyn BroadcasterTransport>,

    /// Failed start totals, shared with `/v1/stats`.
    pub counters: Arc<FailureCounters>,

    /// Cancelled on shutdown; every session start runs under a child token.
    pub shutdown: CancellationToken,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `POST /v1/sessions` - Start a session
/// - `GET /v1/stats` - Failure counters snapshot
/// - `PUT /v1/workers/:id`, `DELETE /v1/workers/:id` - Worker registration
/// - `PUT /v1/workers/:id/status` - Worker status reports
/// - `/health`, `/ready` - Liveness and readiness checks
/// - TraceLayer for request logging
///
/// No request timeout layer: a start may legitimately take several worker
/// round trips.
pub fn build_routes(state: Arc<AppState>, health: Arc<HealthState>) -> Router {
    let api_routes = Router::new()
        .route("/v1/sessions", post(handlers::start_session))
        .route("/v1/stats", get(handlers::get_stats))
        .route(
            "/v1/workers/:id",
            put(handlers::register_worker).delete(handlers::remove_worker),
        )
        .route("/v1/workers/:id/status", put(handlers::update_worker_status))
        .with_state(state);

    api_routes
        .merge(health_router(health))
        .layer(TraceLayer::new_for_http())
}
