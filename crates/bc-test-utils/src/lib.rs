//! # BC Test Utilities
//!
//! Shared test utilities for the Broadcast Controller (BC) service.
//!
//! This crate provides mock implementations and test fixtures for
//! isolated session start testing without real broadcaster workers.
//!
//! ## Modules
//!
//! - `mock_pool` - Scripted worker pool that records every call
//! - `mock_broadcaster` - Scripted broadcaster transport
//! - `fixtures` - Start requests, configuration and application state
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let pool = Arc::new(MockWorkerPool::returning_many(&["jibri1", "jibri2"]));
//!     let broadcaster = Arc::new(MockBroadcaster::replying(vec![
//!         ScriptedReply::ServiceUnavailable,
//!         ScriptedReply::Pending,
//!     ]));
//!
//!     let request = StartRequestBuilder::new().max_retries(2).build();
//!     // Run a SessionStarter against the mocks...
//! }
//! ```

pub mod fixtures;
pub mod mock_broadcaster;
pub mod mock_pool;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_broadcaster::*;
pub use mock_pool::*;
