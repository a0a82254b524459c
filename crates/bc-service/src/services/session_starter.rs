//! Session start with candidate failover.
//!
//! A `SessionStarter` turns one start request into either a session a worker
//! accepted (PENDING) or a single [`StartFailure`]. It owns the retry loop:
//!
//! 1. Check that any worker is connected at all
//! 2. Ask the pool for a candidate
//! 3. Send the start request and classify the reply
//! 4. PENDING ends the loop; a retryable reply or transport error retries
//!    with whoever the pool selects next, up to `N + 1` round trips; anything
//!    else gives up
//!
//! Transport errors are reported to the pool against the attempted candidate,
//! which moves it to the back of the order. A BUSY worker is healthy, it just
//! cannot take this session right now: it is reported separately so the pool
//! can hand out another idle worker without demoting it.
//!
//! Every give-up except cancellation is counted once in [`FailureCounters`].

use crate::errors::{StartFailure, StartFailureKind};
use crate::models::{BroadcastStatus, FailureReason, SessionHandle, SessionKind, StartRequest};
use crate::observability::metrics;
use crate::observability::FailureCounters;
use crate::services::broadcaster_client::{BroadcasterReply, BroadcasterTransport, StartEnvelope};
use crate::services::worker_pool::{Candidate, WorkerPool};
use common::types::WorkerId;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// How a single reply moves the start loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// No application reply; the worker had a transient error.
    TransportError,
    /// OFF, retry flag set, reason BUSY.
    BusyRetryable,
    /// Retry flag set for any other reason.
    OtherRetryable,
    /// The worker accepted the session.
    Pending,
    /// Neither PENDING nor retryable.
    Fatal,
}

impl ReplyClass {
    /// Classify a reply.
    ///
    /// A PENDING status wins over the retry flag.
    #[must_use]
    pub fn classify(reply: &BroadcasterReply) -> Self {
        let response = match reply {
            BroadcasterReply::TransportError { .. } => return ReplyClass::TransportError,
            BroadcasterReply::Response(response) => response,
        };

        match (response.status, response.should_retry, response.failure_reason) {
            (BroadcastStatus::Pending, _, _) => ReplyClass::Pending,
            (BroadcastStatus::Off, true, Some(FailureReason::Busy)) => ReplyClass::BusyRetryable,
            (_, true, _) => ReplyClass::OtherRetryable,
            (_, false, _) => ReplyClass::Fatal,
        }
    }

    /// Whether the loop continues after this reply (budget permitting).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReplyClass::TransportError | ReplyClass::BusyRetryable | ReplyClass::OtherRetryable
        )
    }

    /// Returns the class as a string for metric labels and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReplyClass::TransportError => "transport_error",
            ReplyClass::BusyRetryable => "busy_retryable",
            ReplyClass::OtherRetryable => "other_retryable",
            ReplyClass::Pending => "pending",
            ReplyClass::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ReplyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workers tried during one start and how each replied, in order.
#[derive(Debug, Default)]
struct AttemptLedger {
    entries: Vec<(WorkerId, ReplyClass)>,
}

impl AttemptLedger {
    fn record(&mut self, worker: WorkerId, class: ReplyClass) {
        self.entries.push((worker, class));
    }

    /// Transport round trips made so far.
    fn round_trips(&self) -> u32 {
        u32::try_from(self.entries.len()).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for AttemptLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (worker, class)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{worker}:{class}")?;
        }
        Ok(())
    }
}

enum StartState {
    Init,
    Selecting,
    AwaitingReply(Candidate),
    Retry,
    PendingOk(Candidate),
    GaveUp(StartFailureKind),
}

/// Drives one session start to acceptance or failure.
///
/// Created per start request and consumed by [`SessionStarter::start`].
pub struct SessionStarter {
    request: StartRequest,
    kind: SessionKind,
    pool: Arc<dyn WorkerPool>,
    transport: Arc<dyn BroadcasterTransport>,
    counters: Arc<FailureCounters>,
}

impl SessionStarter {
    /// Create a starter for `request`.
    ///
    /// The retry bound N is `request.max_retries`.
    #[must_use]
    pub fn new(
        request: StartRequest,
        kind: SessionKind,
        pool: Arc<dyn WorkerPool>,
        transport: Arc<dyn BroadcasterTransport>,
        counters: Arc<FailureCounters>,
    ) -> Self {
        Self {
            request,
            kind,
            pool,
            transport,
            counters,
        }
    }

    /// Run the start loop.
    ///
    /// Returns as soon as a worker replies PENDING. At most one request is in
    /// flight at a time and at most `N + 1` are sent.
    ///
    /// # Errors
    ///
    /// - `NoCandidateAvailable` if no worker is connected or the pool has no
    ///   candidate for an attempt
    /// - `RetriesExhausted` after `N + 1` retryable replies or transport errors
    /// - `FatalReply` on the first reply that is neither PENDING nor retryable
    /// - `Cancelled` if `cancel` fires; the in-flight worker is not penalized
    ///   and no failure is counted
    #[instrument(
        skip_all,
        fields(
            session_id = %self.request.session_id,
            session_kind = %self.kind,
            room = %self.request.room
        )
    )]
    pub async fn start(self, cancel: &CancellationToken) -> Result<SessionHandle, StartFailure> {
        let started = Instant::now();
        let max_retries = self.request.max_retries;
        let mut attempts: u32 = 0;
        let mut ledger = AttemptLedger::default();
        let mut state = StartState::Init;

        loop {
            state = match state {
                StartState::Init => {
                    if cancel.is_cancelled() {
                        StartState::GaveUp(StartFailureKind::Cancelled)
                    } else if self.pool.any_connected() {
                        StartState::Selecting
                    } else {
                        tracing::warn!(
                            target: "bc.service.session_starter",
                            "No broadcaster worker is connected"
                        );
                        StartState::GaveUp(StartFailureKind::NoCandidateAvailable)
                    }
                }

                StartState::Selecting => {
                    if cancel.is_cancelled() {
                        StartState::GaveUp(StartFailureKind::Cancelled)
                    } else if let Some(candidate) = self.pool.select_candidate() {
                        StartState::AwaitingReply(candidate)
                    } else {
                        tracing::warn!(
                            target: "bc.service.session_starter",
                            attempt = attempts + 1,
                            "No candidate worker available"
                        );
                        StartState::GaveUp(StartFailureKind::NoCandidateAvailable)
                    }
                }

                StartState::AwaitingReply(candidate) => {
                    let envelope = StartEnvelope::new(candidate.clone(), self.kind, &self.request);
                    let reply = tokio::select! {
                        biased;
                        () = cancel.cancelled() => None,
                        reply = self.transport.send_and_await_reply(&envelope) => Some(reply),
                    };

                    match reply {
                        None => StartState::GaveUp(StartFailureKind::Cancelled),
                        Some(reply) => self.on_reply(candidate, &reply, &mut ledger),
                    }
                }

                StartState::Retry => {
                    attempts += 1;
                    if attempts > max_retries {
                        StartState::GaveUp(StartFailureKind::RetriesExhausted)
                    } else {
                        StartState::Selecting
                    }
                }

                StartState::PendingOk(candidate) => {
                    return Ok(self.accept(candidate, &ledger, started));
                }

                StartState::GaveUp(kind) => {
                    return Err(self.give_up(kind, &ledger, started));
                }
            };
        }
    }

    /// Classify one reply, report it to the pool, and pick the next state.
    fn on_reply(
        &self,
        candidate: Candidate,
        reply: &BroadcasterReply,
        ledger: &mut AttemptLedger,
    ) -> StartState {
        let class = ReplyClass::classify(reply);
        ledger.record(candidate.id.clone(), class);
        metrics::record_start_attempt(self.kind.as_str(), class.as_str());

        match (class, reply) {
            (ReplyClass::Pending, _) => StartState::PendingOk(candidate),
            (
                ReplyClass::TransportError,
                BroadcasterReply::TransportError { worker, condition },
            ) => {
                tracing::warn!(
                    target: "bc.service.session_starter",
                    worker = %candidate.id,
                    reply_from = %worker,
                    condition = %condition,
                    "Worker had a transient error, trying another"
                );
                metrics::record_worker_transient_error(condition.as_str());
                self.pool.report_transient_error(&candidate.id);
                StartState::Retry
            }
            (ReplyClass::BusyRetryable, _) => {
                tracing::info!(
                    target: "bc.service.session_starter",
                    worker = %candidate.id,
                    "Worker is busy, trying another"
                );
                self.pool.report_busy(&candidate.id);
                StartState::Retry
            }
            (class, _) if class.is_retryable() => {
                tracing::info!(
                    target: "bc.service.session_starter",
                    worker = %candidate.id,
                    reply_class = %class,
                    "Worker cannot take the session, trying another"
                );
                StartState::Retry
            }
            (_, _) => {
                tracing::warn!(
                    target: "bc.service.session_starter",
                    worker = %candidate.id,
                    reply = ?reply,
                    "Worker refused the session"
                );
                StartState::GaveUp(StartFailureKind::FatalReply)
            }
        }
    }

    fn accept(&self, candidate: Candidate, ledger: &AttemptLedger, started: Instant) -> SessionHandle {
        let attempts = ledger.round_trips();
        tracing::info!(
            target: "bc.service.session_starter",
            worker = %candidate.id,
            attempts = attempts,
            "Session accepted by worker"
        );
        metrics::record_session_start(self.kind.as_str(), "started", started.elapsed());

        SessionHandle {
            session_id: self.request.session_id.clone(),
            kind: self.kind,
            worker: candidate.id,
            status: BroadcastStatus::Pending,
            attempts,
            started_at: chrono::Utc::now(),
        }
    }

    fn give_up(&self, kind: StartFailureKind, ledger: &AttemptLedger, started: Instant) -> StartFailure {
        if kind.counts_as_failure() {
            self.counters.record(self.kind);
            tracing::error!(
                target: "bc.service.session_starter",
                reason = %kind,
                attempts = ledger.round_trips(),
                tried = %ledger,
                "Gave up starting session"
            );
        } else {
            tracing::info!(
                target: "bc.service.session_starter",
                attempts = ledger.round_trips(),
                "Session start cancelled"
            );
        }
        metrics::record_session_start(self.kind.as_str(), kind.as_str(), started.elapsed());

        StartFailure {
            kind,
            session_kind: self.kind,
            attempts: ledger.round_trips(),
        }
    }
}
