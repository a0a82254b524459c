//! Broadcast Controller (BC) Service Library
//!
//! This library provides the core functionality for the Dark Tower
//! Broadcast Controller - the component of the conference focus that starts
//! recording, live streaming and SIP call sessions on external broadcaster
//! workers:
//!
//! - Retry and failover of session starts across a pool of candidate workers
//! - Classification of worker replies (transient error, busy, pending, fatal)
//! - Per-kind failure counters exposed as a stable JSON snapshot
//! - Prometheus metrics for start attempts and outcomes
//!
//! # Architecture
//!
//! The BC follows the Handler -> Service pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/session_starter.rs
//!                                     ├── services/worker_pool.rs (candidate order)
//!                                     ├── services/broadcaster_client.rs (worker transport)
//!                                     └── observability/failure_counters.rs
//! ```
//!
//! # Modules
//!
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with HTTP status code mapping
//! - [`handlers`] - HTTP request handlers
//! - [`models`] - Session data model
//! - [`observability`] - Failure counters, metrics and health
//! - [`routes`] - Axum router setup
//! - [`services`] - Worker pool, broadcaster transport and the session starter

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
