//! Operational stats endpoint.

use crate::observability::FailureCountersSnapshot;
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// Handler for GET /v1/stats
///
/// Returns the failed session start totals:
/// ```json
/// {"total_live_streaming_failures":0,"total_recording_failures":1,"total_sip_call_failures":0}
/// ```
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<FailureCountersSnapshot> {
    Json(state.counters.snapshot())
}
