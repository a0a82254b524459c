//! Data models for the Broadcast Controller.

use chrono::{DateTime, Utc};
use common::secret::SecretString;
use common::types::{RoomId, SessionId, WorkerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of broadcast session a worker is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionKind {
    /// Dial a SIP address into the conference.
    SipCall,
    /// Stream the conference to an external streaming service.
    LiveStreaming,
    /// Record the conference to a file.
    Recording,
}

impl SessionKind {
    /// All session kinds, in a stable order.
    pub const ALL: [SessionKind; 3] = [
        SessionKind::SipCall,
        SessionKind::LiveStreaming,
        SessionKind::Recording,
    ];

    /// Returns the session kind as a string for metric labels and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionKind::SipCall => "sip_call",
            SessionKind::LiveStreaming => "live_streaming",
            SessionKind::Recording => "recording",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session status reported by a broadcaster worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    /// Worker accepted the session and is preparing it.
    Pending,
    /// Session is running.
    On,
    /// Session is not running.
    Off,
    /// Any status this controller does not know about.
    #[serde(other)]
    Undefined,
}

/// Why a worker refused or stopped a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Worker is already running a session.
    Busy,
    /// Worker hit an error.
    Error,
    /// Any reason this controller does not know about.
    #[serde(other)]
    Undefined,
}

/// Configuration of a session start, fixed when the start is requested.
///
/// Every field is carried verbatim into each start request sent to a worker.
/// The SIP flag is expressed by [`SessionKind::SipCall`].
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// Conference room the session is for.
    pub room: RoomId,
    /// Who asked for the session.
    pub initiator: String,
    /// How long the worker may stay in PENDING before the session is
    /// considered stuck (hint carried to the worker).
    pub pending_timeout: Duration,
    /// Additional attempts after the first (N).
    pub max_retries: u32,
    /// SIP address to dial (SIP calls only).
    pub sip_address: Option<String>,
    /// Display name the worker joins the conference with.
    pub display_name: Option<String>,
    /// Stream credential (live streaming key). Never logged.
    pub stream_id: Option<SecretString>,
    /// External broadcast identifier (e.g. a YouTube broadcast).
    pub broadcast_id: Option<String>,
    /// Session identifier shared with the worker.
    pub session_id: SessionId,
    /// Opaque application data passed through to the worker.
    pub app_data: Option<String>,
}

/// Handle to a session a worker accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionHandle {
    /// Session identifier.
    pub session_id: SessionId,
    /// Kind of the session.
    pub kind: SessionKind,
    /// Worker running the session.
    pub worker: WorkerId,
    /// Always [`BroadcastStatus::Pending`] when returned from a start.
    pub status: BroadcastStatus,
    /// Transport round trips it took to get the session accepted.
    pub attempts: u32,
    /// When the worker accepted the session.
    pub started_at: DateTime<Utc>,
}
