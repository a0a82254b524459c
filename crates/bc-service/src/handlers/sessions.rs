//! Session handlers for the Broadcast Controller.
//!
//! - `POST /v1/sessions` - Start a recording, live streaming or SIP session
//!
//! The request waits until a worker accepts the session (PENDING) or the
//! start gives up. Shutdown cancels in-flight starts.

use crate::config::Config;
use crate::errors::BcError;
use crate::models::{SessionHandle, SessionKind, StartRequest};
use crate::routes::AppState;
use crate::services::SessionStarter;
use axum::{extract::State, http::StatusCode, Json};
use common::secret::SecretString;
use common::types::{RoomId, SessionId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Request body for `POST /v1/sessions`.
#[derive(Debug, Deserialize)]
pub struct StartSessionBody {
    pub room: String,
    pub initiator: String,
    pub kind: SessionKind,
    pub sip_address: Option<String>,
    pub display_name: Option<String>,
    pub stream_id: Option<SecretString>,
    pub broadcast_id: Option<String>,
    /// Generated when absent.
    pub session_id: Option<String>,
    pub app_data: Option<String>,
}

impl StartSessionBody {
    /// Validate the body and build the start request from it and `config`.
    ///
    /// # Errors
    ///
    /// `BcError::BadRequest` when a required field is empty or missing for
    /// the session kind.
    pub fn into_start_request(self, config: &Config) -> Result<(SessionKind, StartRequest), BcError> {
        let room = non_empty(self.room, "room")?;
        let initiator = non_empty(self.initiator, "initiator")?;

        let sip_address = self.sip_address.filter(|s| !s.trim().is_empty());
        let broadcast_id = self.broadcast_id.filter(|s| !s.trim().is_empty());

        match self.kind {
            SessionKind::SipCall if sip_address.is_none() => {
                return Err(BcError::BadRequest(
                    "sip_address is required for SIP_CALL sessions".to_string(),
                ));
            }
            SessionKind::LiveStreaming if self.stream_id.is_none() && broadcast_id.is_none() => {
                return Err(BcError::BadRequest(
                    "stream_id or broadcast_id is required for LIVE_STREAMING sessions"
                        .to_string(),
                ));
            }
            _ => {}
        }

        let session_id = match self.session_id {
            Some(id) => SessionId::new(non_empty(id, "session_id")?),
            None => SessionId::generate(),
        };

        let request = StartRequest {
            room: RoomId::new(room),
            initiator,
            pending_timeout: config.pending_timeout,
            max_retries: config.max_start_retries,
            sip_address,
            display_name: self.display_name,
            stream_id: self.stream_id,
            broadcast_id,
            session_id,
            app_data: self.app_data,
        };

        Ok((self.kind, request))
    }
}

fn non_empty(value: String, field: &str) -> Result<String, BcError> {
    if value.trim().is_empty() {
        Err(BcError::BadRequest(format!("{field} must not be empty")))
    } else {
        Ok(value)
    }
}

/// Handler for POST /v1/sessions
///
/// # Response
///
/// - 201 Created: A worker accepted the session; body is the session handle
/// - 400 Bad Request: Missing or empty fields
/// - 502 Bad Gateway: A worker refused the session
/// - 503 Service Unavailable: No worker available, retries exhausted, or
///   shutting down
#[instrument(skip_all, fields(kind = %body.kind))]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartSessionBody>,
) -> Result<(StatusCode, Json<SessionHandle>), BcError> {
    let (kind, request) = body.into_start_request(&state.config)?;

    let starter = SessionStarter::new(
        request,
        kind,
        Arc::clone(&state.pool),
        Arc::clone(&state.transport),
        Arc::clone(&state.counters),
    );

    let cancel = state.shutdown.child_token();
    let handle = starter.start(&cancel).await?;

    Ok((StatusCode::CREATED, Json(handle)))
}
