//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across the Broadcast Controller.
//! The main consumer is the stream credential (e.g. a live-streaming key)
//! carried from the start request to the broadcaster worker: it must reach
//! the worker verbatim but never appear in logs or `Debug` output.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct StreamTarget {
//!     broadcast_id: String,
//!     stream_key: SecretString,
//! }
//!
//! let target = StreamTarget {
//!     broadcast_id: "yt-broadcast-1".to_string(),
//!     stream_key: SecretString::from("abcd-efgh-ijkl"),
//! };
//!
//! // Debug output redacts the key
//! assert!(!format!("{target:?}").contains("abcd-efgh-ijkl"));
//!
//! // Access is explicit
//! assert_eq!(target.stream_key.expose_secret(), "abcd-efgh-ijkl");
//! ```
//!
//! With the `serde` feature enabled, secrets deserialize directly from JSON
//! request bodies. They deliberately do not implement `Serialize`; callers
//! expose the value into an outbound body explicitly.

pub use secrecy::{ExposeSecret, SecretString};
