//! Mock broadcaster transport for session start testing.
//!
//! Replies follow a script (the last entry repeats), or a fixed reply per
//! worker. Every envelope sent is captured so tests can check who each
//! attempt was addressed to.
//!
//! # Example
//!
//! ```rust,ignore
//! use bc_test_utils::{MockBroadcaster, ScriptedReply};
//!
//! let broadcaster = MockBroadcaster::replying(vec![
//!     ScriptedReply::Busy,
//!     ScriptedReply::Pending,
//! ]);
//! ```

use bc_service::models::FailureReason;
use bc_service::services::broadcaster_client::{
    BroadcastResponse, BroadcasterReply, BroadcasterTransport, StartEnvelope,
    TransportErrorCondition,
};
use common::types::WorkerId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedReply {
    /// PENDING, no retry flag.
    Pending,
    /// PENDING with the retry flag set.
    PendingWithRetry,
    /// OFF, retry, reason BUSY.
    Busy,
    /// OFF, retry, reason ERROR.
    OtherRetryable,
    /// OFF, no retry.
    Fatal,
    /// Transport error: service unavailable.
    ServiceUnavailable,
    /// Transport error: timeout.
    Timeout,
    /// Never replies.
    Hang,
}

impl ScriptedReply {
    /// The reply for `worker`, or `None` for [`ScriptedReply::Hang`].
    fn into_reply(self, worker: &WorkerId) -> Option<BroadcasterReply> {
        let reply = match self {
            ScriptedReply::Pending => BroadcasterReply::Response(BroadcastResponse::pending()),
            ScriptedReply::PendingWithRetry => BroadcasterReply::Response(BroadcastResponse {
                should_retry: true,
                ..BroadcastResponse::pending()
            }),
            ScriptedReply::Busy => {
                BroadcasterReply::Response(BroadcastResponse::off(FailureReason::Busy, true))
            }
            ScriptedReply::OtherRetryable => {
                BroadcasterReply::Response(BroadcastResponse::off(FailureReason::Error, true))
            }
            ScriptedReply::Fatal => {
                BroadcasterReply::Response(BroadcastResponse::off(FailureReason::Error, false))
            }
            ScriptedReply::ServiceUnavailable => BroadcasterReply::TransportError {
                worker: worker.clone(),
                condition: TransportErrorCondition::ServiceUnavailable,
            },
            ScriptedReply::Timeout => BroadcasterReply::TransportError {
                worker: worker.clone(),
                condition: TransportErrorCondition::Timeout,
            },
            ScriptedReply::Hang => return None,
        };
        Some(reply)
    }
}

/// Scripted broadcaster transport.
pub struct MockBroadcaster {
    script: Vec<ScriptedReply>,
    per_worker: HashMap<WorkerId, ScriptedReply>,
    delay: Option<Duration>,
    envelopes: Mutex<Vec<StartEnvelope>>,
}

impl MockBroadcaster {
    /// Reply with `script` in order, then keep repeating the last entry.
    #[must_use]
    pub fn replying(script: Vec<ScriptedReply>) -> Self {
        Self {
            script,
            per_worker: HashMap::new(),
            delay: None,
            envelopes: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` to every request.
    #[must_use]
    pub fn always(reply: ScriptedReply) -> Self {
        Self::replying(vec![reply])
    }

    /// Reply by addressee: each listed worker always gets its reply, any
    /// other worker gets PENDING.
    #[must_use]
    pub fn per_worker(replies: &[(&str, ScriptedReply)]) -> Self {
        Self {
            per_worker: replies
                .iter()
                .map(|(id, reply)| (WorkerId::new(*id), *reply))
                .collect(),
            ..Self::always(ScriptedReply::Pending)
        }
    }

    /// Wait `delay` before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.envelopes.lock().unwrap().len()
    }

    /// Every envelope received, in order.
    pub fn envelopes(&self) -> Vec<StartEnvelope> {
        self.envelopes.lock().unwrap().clone()
    }

    /// Addressee of every request, in order.
    pub fn addressed_to(&self) -> Vec<WorkerId> {
        self.envelopes().into_iter().map(|e| e.to.id).collect()
    }
}

#[async_trait::async_trait]
impl BroadcasterTransport for MockBroadcaster {
    async fn send_and_await_reply(&self, envelope: &StartEnvelope) -> BroadcasterReply {
        let scripted = {
            let mut envelopes = self.envelopes.lock().unwrap();
            let i = envelopes.len();
            envelopes.push(envelope.clone());
            self.per_worker
                .get(&envelope.to.id)
                .or_else(|| self.script.get(i))
                .or_else(|| self.script.last())
                .copied()
                .unwrap_or(ScriptedReply::Pending)
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match scripted.into_reply(&envelope.to.id) {
            Some(reply) => reply,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::StartRequestBuilder;
    use crate::mock_pool::candidate;
    use bc_service::models::SessionKind;

    fn envelope(id: &str) -> StartEnvelope {
        StartEnvelope::new(
            candidate(id),
            SessionKind::Recording,
            &StartRequestBuilder::new().build(),
        )
    }

    #[tokio::test]
    async fn test_script_repeats_last_entry() {
        let mock = MockBroadcaster::replying(vec![
            ScriptedReply::ServiceUnavailable,
            ScriptedReply::Busy,
        ]);

        let first = mock.send_and_await_reply(&envelope("a")).await;
        assert_eq!(
            first,
            BroadcasterReply::TransportError {
                worker: WorkerId::new("a"),
                condition: TransportErrorCondition::ServiceUnavailable,
            }
        );

        for id in ["b", "c"] {
            let reply = mock.send_and_await_reply(&envelope(id)).await;
            assert_eq!(
                reply,
                BroadcasterReply::Response(BroadcastResponse::off(FailureReason::Busy, true))
            );
        }

        assert_eq!(mock.call_count(), 3);
        assert_eq!(
            mock.addressed_to(),
            vec![WorkerId::new("a"), WorkerId::new("b"), WorkerId::new("c")]
        );
    }

    #[tokio::test]
    async fn test_per_worker_replies() {
        let mock = MockBroadcaster::per_worker(&[("a", ScriptedReply::Busy)]);

        for _ in 0..2 {
            assert_eq!(
                mock.send_and_await_reply(&envelope("a")).await,
                BroadcasterReply::Response(BroadcastResponse::off(FailureReason::Busy, true))
            );
        }
        assert_eq!(
            mock.send_and_await_reply(&envelope("b")).await,
            BroadcasterReply::Response(BroadcastResponse::pending())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_replies() {
        let mock = MockBroadcaster::always(ScriptedReply::Hang);
        let result = tokio::time::timeout(
            Duration::from_secs(60),
            mock.send_and_await_reply(&envelope("a")),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
