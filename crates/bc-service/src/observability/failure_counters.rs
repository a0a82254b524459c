//! Session start failure counters.
//!
//! One monotonic counter per [`SessionKind`], incremented once for every
//! session start that gives up. The counters are created at service start,
//! shared with every session starter and with the stats endpoint, and never
//! reset.
//!
//! The snapshot serializes with fixed keys consumed by the operational stats
//! endpoint:
//!
//! ```json
//! {
//!   "total_live_streaming_failures": 0,
//!   "total_recording_failures": 2,
//!   "total_sip_call_failures": 0
//! }
//! ```

use crate::models::SessionKind;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Failed session starts per session kind.
///
/// All fields are atomic for lock-free concurrent access.
#[derive(Debug, Default)]
pub struct FailureCounters {
    sip_call: AtomicU64,
    live_streaming: AtomicU64,
    recording: AtomicU64,
}

/// Point-in-time values of the failure counters.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCountersSnapshot {
    /// Failed live streaming starts.
    pub total_live_streaming_failures: u64,
    /// Failed recording starts.
    pub total_recording_failures: u64,
    /// Failed SIP call starts.
    pub total_sip_call_failures: u64,
}

impl FailureCountersSnapshot {
    /// Value for one session kind.
    #[must_use]
    pub fn get(&self, kind: SessionKind) -> u64 {
        match kind {
            SessionKind::SipCall => self.total_sip_call_failures,
            SessionKind::LiveStreaming => self.total_live_streaming_failures,
            SessionKind::Recording => self.total_recording_failures,
        }
    }
}

impl FailureCounters {
    /// Create a new shared counters instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn counter(&self, kind: SessionKind) -> &AtomicU64 {
        match kind {
            SessionKind::SipCall => &self.sip_call,
            SessionKind::LiveStreaming => &self.live_streaming,
            SessionKind::Recording => &self.recording,
        }
    }

    /// Count one failed start of `kind`.
    pub fn record(&self, kind: SessionKind) {
        let total = self.counter(kind).fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            target: "bc.stats",
            session_kind = kind.as_str(),
            total_failures = total,
            "Session start failure recorded"
        );
    }

    /// Current value for one session kind.
    #[must_use]
    pub fn get(&self, kind: SessionKind) -> u64 {
        self.counter(kind).load(Ordering::SeqCst)
    }

    /// Read all counters.
    ///
    /// Each value is read atomically; the three reads are not one atomic
    /// operation, so a snapshot may interleave with concurrent increments.
    #[must_use]
    pub fn snapshot(&self) -> FailureCountersSnapshot {
        FailureCountersSnapshot {
            total_live_streaming_failures: self.live_streaming.load(Ordering::SeqCst),
            total_recording_failures: self.recording.load(Ordering::SeqCst),
            total_sip_call_failures: self.sip_call.load(Ordering::SeqCst),
        }
    }
}
