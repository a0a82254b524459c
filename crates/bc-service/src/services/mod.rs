//! Service layer for the Broadcast Controller.
//!
//! # Components
//!
//! - `worker_pool` - Broadcaster worker selection order and availability
//! - `broadcaster_client` - Start request transport to broadcaster workers
//! - `session_starter` - Retry and failover loop for one session start

pub mod broadcaster_client;
pub mod session_starter;
pub mod worker_pool;

pub use broadcaster_client::{
    BroadcastResponse, BroadcasterReply, BroadcasterTransport, HttpBroadcasterClient,
    StartEnvelope, TransportErrorCondition,
};
pub use session_starter::{ReplyClass, SessionStarter};
pub use worker_pool::{Candidate, InMemoryWorkerPool, WorkerPool, WorkerPresence, WorkerStatus};
