//! Observability for the Broadcast Controller.
//!
//! - `failure_counters`: per-kind failed session start totals served on `/v1/stats`
//! - `metrics`: Prometheus metrics served on `/metrics`
//! - `health`: liveness and readiness checks

pub mod failure_counters;
pub mod health;
pub mod metrics;

pub use failure_counters::{FailureCounters, FailureCountersSnapshot};
pub use health::{health_router, HealthState};
