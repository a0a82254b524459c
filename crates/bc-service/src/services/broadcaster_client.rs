//! Broadcaster worker transport.
//!
//! A start request is sent to one worker and exactly one reply comes back:
//! either the worker's application reply or a transport error naming the
//! worker. The session starter never sees transport details beyond
//! [`TransportErrorCondition`].
//!
//! # Security
//!
//! - The stream credential is exposed only into the request body
//! - Timeouts prevent hanging connections
//! - Worker response bodies are never logged

use crate::errors::BcError;
use crate::models::{BroadcastStatus, FailureReason, SessionKind, StartRequest};
use crate::services::worker_pool::Candidate;
use common::secret::{ExposeSecret, SecretString};
use common::types::{RoomId, SessionId, WorkerId};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Default connect timeout in seconds.
const WORKER_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Header carrying the addressed worker id.
pub const WORKER_ID_HEADER: &str = "X-Broadcast-Worker";

/// What the worker is asked to do with the conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Dial out to a SIP address.
    Sip,
    /// Push to a streaming service.
    Stream,
    /// Write to a file.
    File,
}

impl From<SessionKind> for BroadcastMode {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::SipCall => BroadcastMode::Sip,
            SessionKind::LiveStreaming => BroadcastMode::Stream,
            SessionKind::Recording => BroadcastMode::File,
        }
    }
}

/// One start request addressed to one worker.
///
/// Built fresh for every attempt from the session's [`StartRequest`]; only
/// the addressee changes between attempts.
#[derive(Debug, Clone)]
pub struct StartEnvelope {
    /// Worker the request is addressed to.
    pub to: Candidate,
    pub session_kind: SessionKind,
    pub room: RoomId,
    pub initiator: String,
    pub sip_address: Option<String>,
    pub display_name: Option<String>,
    pub stream_id: Option<SecretString>,
    pub broadcast_id: Option<String>,
    pub session_id: SessionId,
    pub app_data: Option<String>,
    pub pending_timeout: Duration,
}

impl StartEnvelope {
    /// Address `request` to `to`.
    #[must_use]
    pub fn new(to: Candidate, session_kind: SessionKind, request: &StartRequest) -> Self {
        Self {
            to,
            session_kind,
            room: request.room.clone(),
            initiator: request.initiator.clone(),
            sip_address: request.sip_address.clone(),
            display_name: request.display_name.clone(),
            stream_id: request.stream_id.clone(),
            broadcast_id: request.broadcast_id.clone(),
            session_id: request.session_id.clone(),
            app_data: request.app_data.clone(),
            pending_timeout: request.pending_timeout,
        }
    }

    #[must_use]
    pub fn mode(&self) -> BroadcastMode {
        BroadcastMode::from(self.session_kind)
    }
}

/// Application reply from a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub status: BroadcastStatus,
    /// Whether the worker considers the failure worth retrying elsewhere.
    #[serde(default)]
    pub should_retry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl BroadcastResponse {
    /// A PENDING reply without the retry flag.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: BroadcastStatus::Pending,
            should_retry: false,
            failure_reason: None,
        }
    }

    /// An OFF reply with the given failure reason and retry flag.
    #[must_use]
    pub fn off(failure_reason: FailureReason, should_retry: bool) -> Self {
        Self {
            status: BroadcastStatus::Off,
            should_retry,
            failure_reason: Some(failure_reason),
        }
    }
}

/// Why a start request produced no application reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorCondition {
    /// The worker said it cannot take requests right now.
    ServiceUnavailable,
    /// No reply within the request timeout.
    Timeout,
    /// The worker could not be reached.
    Unreachable,
    /// The worker replied with a body that could not be decoded.
    BadResponse,
    /// Any other non-success status.
    Status(u16),
}

impl TransportErrorCondition {
    /// Returns the condition as a string for metric labels and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportErrorCondition::ServiceUnavailable => "service_unavailable",
            TransportErrorCondition::Timeout => "timeout",
            TransportErrorCondition::Unreachable => "unreachable",
            TransportErrorCondition::BadResponse => "bad_response",
            TransportErrorCondition::Status(_) => "status",
        }
    }
}

impl fmt::Display for TransportErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorCondition::Status(code) => write!(f, "status {code}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// The single reply to a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcasterReply {
    /// No application reply; `worker` is the worker the request was sent to.
    TransportError {
        worker: WorkerId,
        condition: TransportErrorCondition,
    },
    /// The worker answered.
    Response(BroadcastResponse),
}

/// Request/reply exchange with broadcaster workers (enables mocking).
#[async_trait::async_trait]
pub trait BroadcasterTransport: Send + Sync {
    /// Send `envelope` to its addressee and wait for the one reply.
    ///
    /// Never fails: every failure to obtain an application reply is a
    /// [`BroadcasterReply::TransportError`].
    async fn send_and_await_reply(&self, envelope: &StartEnvelope) -> BroadcasterReply;
}

#[derive(Serialize)]
struct WireStartRequest<'a> {
    room: &'a str,
    initiator: &'a str,
    mode: BroadcastMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    sip_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    broadcast_id: Option<&'a str>,
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_data: Option<&'a str>,
    pending_timeout_secs: u64,
}

impl<'a> From<&'a StartEnvelope> for WireStartRequest<'a> {
    fn from(envelope: &'a StartEnvelope) -> Self {
        Self {
            room: envelope.room.as_str(),
            initiator: &envelope.initiator,
            mode: envelope.mode(),
            sip_address: envelope.sip_address.as_deref(),
            display_name: envelope.display_name.as_deref(),
            stream_id: envelope.stream_id.as_ref().map(|s| s.expose_secret()),
            broadcast_id: envelope.broadcast_id.as_deref(),
            session_id: envelope.session_id.as_str(),
            app_data: envelope.app_data.as_deref(),
            pending_timeout_secs: envelope.pending_timeout.as_secs(),
        }
    }
}

/// HTTP client for broadcaster worker start endpoints.
#[derive(Clone)]
pub struct HttpBroadcasterClient {
    client: Client,
}

impl HttpBroadcasterClient {
    /// Create a client whose requests time out after `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `BcError::Internal` if the HTTP client cannot be built.
    pub fn new(request_timeout: Duration) -> Result<Self, BcError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(WORKER_CONNECT_TIMEOUT_SECS).min(request_timeout))
            .build()
            .map_err(|e| {
                error!(target: "bc.services.broadcaster_client", error = %e, "Failed to build HTTP client");
                BcError::Internal
            })?;

        Ok(Self { client })
    }

    /// POST the start request to the addressed worker.
    #[instrument(skip_all, fields(worker = %envelope.to.id, session_id = %envelope.session_id))]
    pub async fn start_broadcast(&self, envelope: &StartEnvelope) -> BroadcasterReply {
        let url = format!("{}/v1/broadcasts/start", envelope.to.endpoint);

        let result = self
            .client
            .post(&url)
            .header(WORKER_ID_HEADER, envelope.to.id.as_str())
            .json(&WireStartRequest::from(envelope))
            .send()
            .await;

        let condition = match result {
            Ok(response) => match Self::handle_response(response).await {
                Ok(reply) => return BroadcasterReply::Response(reply),
                Err(condition) => condition,
            },
            Err(e) if e.is_timeout() => TransportErrorCondition::Timeout,
            Err(e) => {
                debug!(target: "bc.services.broadcaster_client", error = %e, "Worker request failed");
                TransportErrorCondition::Unreachable
            }
        };

        warn!(
            target: "bc.services.broadcaster_client",
            condition = %condition,
            "No reply from worker"
        );
        BroadcasterReply::TransportError {
            worker: envelope.to.id.clone(),
            condition,
        }
    }

    /// Map a worker HTTP response to a reply or a transport condition.
    async fn handle_response(
        response: reqwest::Response,
    ) -> Result<BroadcastResponse, TransportErrorCondition> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                if e.is_timeout() {
                    TransportErrorCondition::Timeout
                } else {
                    TransportErrorCondition::BadResponse
                }
            })
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            Err(TransportErrorCondition::ServiceUnavailable)
        } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            Err(TransportErrorCondition::Timeout)
        } else {
            Err(TransportErrorCondition::Status(status.as_u16()))
        }
    }
}

#[async_trait::async_trait]
impl BroadcasterTransport for HttpBroadcasterClient {
    async fn send_and_await_reply(&self, envelope: &StartEnvelope) -> BroadcasterReply {
        self.start_broadcast(envelope).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn envelope(kind: SessionKind) -> StartEnvelope {
        let request = StartRequest {
            room: RoomId::new("room@bar.com"),
            initiator: "foo@bar.com".to_string(),
            pending_timeout: Duration::from_secs(60),
            max_retries: 2,
            sip_address: None,
            display_name: Some("Recorder".to_string()),
            stream_id: Some(SecretString::from("live-key-123".to_string())),
            broadcast_id: None,
            session_id: SessionId::new("session-1"),
            app_data: None,
        };
        StartEnvelope::new(
            Candidate {
                id: WorkerId::new("jibri1@bar.com"),
                endpoint: "http://10.0.0.1:3333".to_string(),
            },
            kind,
            &request,
        )
    }

    #[test]
    fn test_mode_follows_session_kind() {
        assert_eq!(envelope(SessionKind::SipCall).mode(), BroadcastMode::Sip);
        assert_eq!(
            envelope(SessionKind::LiveStreaming).mode(),
            BroadcastMode::Stream
        );
        assert_eq!(envelope(SessionKind::Recording).mode(), BroadcastMode::File);
    }

    #[test]
    fn test_wire_request_exposes_stream_key_only_in_body() {
        let envelope = envelope(SessionKind::LiveStreaming);

        let debug = format!("{envelope:?}");
        assert!(!debug.contains("live-key-123"), "Debug output leaked the stream key");

        let body = serde_json::to_value(WireStartRequest::from(&envelope)).unwrap();
        assert_eq!(body["stream_id"], "live-key-123");
        assert_eq!(body["mode"], "stream");
        assert_eq!(body["pending_timeout_secs"], 60);
        assert_eq!(body["session_id"], "session-1");
        assert!(body.get("sip_address").is_none());
        assert!(body.get("broadcast_id").is_none());
    }

    #[test]
    fn test_response_defaults_for_missing_fields() {
        let reply: BroadcastResponse = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(reply, BroadcastResponse::pending());

        let reply: BroadcastResponse = serde_json::from_str(
            r#"{"status":"off","should_retry":true,"failure_reason":"busy"}"#,
        )
        .unwrap();
        assert_eq!(reply, BroadcastResponse::off(FailureReason::Busy, true));
    }

    #[test]
    fn test_transport_condition_display() {
        assert_eq!(TransportErrorCondition::Timeout.to_string(), "timeout");
        assert_eq!(TransportErrorCondition::Status(418).to_string(), "status 418");
        assert_eq!(TransportErrorCondition::Status(418).as_str(), "status");
    }
}
