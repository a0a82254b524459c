//! HTTP request handlers for the Broadcast Controller.

pub mod metrics;
pub mod sessions;
pub mod stats;
pub mod workers;

pub use metrics::metrics_handler;
pub use sessions::start_session;
pub use stats::get_stats;
pub use workers::{register_worker, remove_worker, update_worker_status};
