//! Metrics definitions for the Broadcast Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `bc_` prefix for Broadcast Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `session_kind`: 3 values (sip_call, live_streaming, recording)
//! - `reply_class`: 5 values (see `ReplyClass::as_str`)
//! - `outcome`: 5 values (started plus the four give-up kinds)
//!
//! Worker ids are never used as labels.

use crate::services::worker_pool::{PoolEvent, PoolListener};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle used to
/// render `/metrics`.
///
/// Must be called before any metrics are recorded. Session start buckets
/// cover a single fast acceptance up to a full retry chain of request
/// timeouts.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("bc_session_start_duration".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000, 60.000,
            ],
        )
        .map_err(|e| format!("Failed to set session start buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record one transport round trip and how its reply was classified.
///
/// Metric: `bc_session_start_attempts_total`
/// Labels: `session_kind`, `reply_class`
pub fn record_start_attempt(session_kind: &str, reply_class: &str) {
    counter!("bc_session_start_attempts_total",
        "session_kind" => session_kind.to_string(),
        "reply_class" => reply_class.to_string()
    )
    .increment(1);
}

/// Record the end of a session start.
///
/// Metrics: `bc_session_starts_total`, `bc_session_start_duration_seconds`
/// Labels: `session_kind`, `outcome`
///
/// `outcome` is `started` or the snake_case give-up kind.
pub fn record_session_start(session_kind: &str, outcome: &str, duration: Duration) {
    histogram!("bc_session_start_duration_seconds",
        "session_kind" => session_kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("bc_session_starts_total",
        "session_kind" => session_kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a transient error reported against a worker.
///
/// Metric: `bc_worker_transient_errors_total`
/// Labels: `condition`
pub fn record_worker_transient_error(condition: &str) {
    counter!("bc_worker_transient_errors_total",
        "condition" => condition.to_string()
    )
    .increment(1);
}

/// Set the number of idle and connected workers.
///
/// Metric: `bc_workers_available`
/// Labels: `state` (idle, connected)
#[allow(clippy::cast_precision_loss)] // Worker counts stay far below 2^52
pub fn set_workers_available(idle: usize, connected: usize) {
    gauge!("bc_workers_available", "state" => "idle").set(idle as f64);
    gauge!("bc_workers_available", "state" => "connected").set(connected as f64);
}

/// Pool listener that keeps the worker availability gauge current.
#[derive(Debug, Default)]
pub struct WorkerAvailabilityListener;

impl PoolListener for WorkerAvailabilityListener {
    fn on_pool_event(&self, event: &PoolEvent) {
        set_workers_available(event.idle_workers, event.connected_workers);
    }
}
