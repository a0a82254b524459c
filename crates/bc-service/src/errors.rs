//! Broadcast Controller error types.
//!
//! `StartFailure` is the single failure surfaced by a session start; its
//! `kind` discriminates why the start gave up. `BcError` maps everything the
//! HTTP layer can fail with to a status code. Error messages returned to
//! clients are intentionally generic; details are logged server-side.

use crate::models::SessionKind;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a session start gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFailureKind {
    /// The worker pool had no candidate, initially or on a retry.
    NoCandidateAvailable,
    /// `N + 1` attempts were made without a PENDING reply.
    RetriesExhausted,
    /// A worker replied with something neither PENDING nor retryable.
    FatalReply,
    /// The caller cancelled the start.
    Cancelled,
}

impl StartFailureKind {
    /// Returns the kind as a string for metric labels and error codes.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StartFailureKind::NoCandidateAvailable => "no_candidate_available",
            StartFailureKind::RetriesExhausted => "retries_exhausted",
            StartFailureKind::FatalReply => "fatal_reply",
            StartFailureKind::Cancelled => "cancelled",
        }
    }

    /// Whether this failure is recorded in the failure counters.
    ///
    /// Cancellation is the caller's decision, not a failed start.
    #[must_use]
    pub const fn counts_as_failure(&self) -> bool {
        !matches!(self, StartFailureKind::Cancelled)
    }
}

impl fmt::Display for StartFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session start that ended without a worker accepting the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to start {session_kind} session ({kind}) after {attempts} attempt(s)")]
pub struct StartFailure {
    /// Why the start gave up.
    pub kind: StartFailureKind,
    /// Kind of the session that failed to start.
    pub session_kind: SessionKind,
    /// Transport round trips made before giving up.
    pub attempts: u32,
}

/// Broadcast Controller error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - StartFailed(FatalReply): 502 Bad Gateway
/// - StartFailed(other): 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum BcError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    StartFailed(#[from] StartFailure),

    #[error("Internal server error")]
    Internal,
}

impl BcError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BcError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            BcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BcError::NotFound(_) => StatusCode::NOT_FOUND,
            BcError::StartFailed(failure) => match failure.kind {
                StartFailureKind::FatalReply => StatusCode::BAD_GATEWAY,
                StartFailureKind::NoCandidateAvailable
                | StartFailureKind::RetriesExhausted
                | StartFailureKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BcError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            BcError::BadRequest(reason) => ("BAD_REQUEST".to_string(), reason.clone()),
            BcError::NotFound(what) => ("NOT_FOUND".to_string(), what.clone()),
            BcError::StartFailed(failure) => {
                let message = match failure.kind {
                    StartFailureKind::NoCandidateAvailable => "No broadcaster is available",
                    StartFailureKind::RetriesExhausted => {
                        "All broadcasters failed to start the session"
                    }
                    StartFailureKind::FatalReply => "The broadcaster refused the session",
                    StartFailureKind::Cancelled => "The session start was cancelled",
                };
                (
                    failure.kind.as_str().to_ascii_uppercase(),
                    message.to_string(),
                )
            }
            BcError::Internal => (
                "INTERNAL_ERROR".to_string(),
                "An internal error occurred".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorDetail { code, message },
        };

        (status, Json(body)).into_response()
    }
}
