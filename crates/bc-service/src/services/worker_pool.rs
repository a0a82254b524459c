//! Broadcaster worker pool.
//!
//! The pool owns the selection order of broadcaster workers. The session
//! starter only ever asks it for the next candidate and reports transient
//! errors and busy replies; it never indexes into the order itself.
//!
//! `InMemoryWorkerPool` keeps workers in an ordered list together with the
//! status last reported by each worker (idle, busy or offline) through
//! [`WorkerPresence`]. Selection returns the first idle worker; a transient
//! error moves the worker to the back of the list so the next selection
//! prefers someone else. A BUSY reply leaves the order alone but holds the
//! worker off for a while, so selection skips it while another idle worker
//! is available.

use crate::config::DEFAULT_BUSY_HOLD_OFF_SECONDS;
use common::types::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A worker handed out by the pool for one start attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Worker identifier.
    pub id: WorkerId,
    /// Base URL the worker accepts start requests on.
    pub endpoint: String,
}

/// Availability of a worker, as last reported by the worker itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Connected and free to take a session.
    Idle,
    /// Connected but already running a session.
    Busy,
    /// Not connected.
    Offline,
}

/// Change in the pool observed by listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEventKind {
    /// A worker joined the pool.
    WorkerAdded(WorkerId),
    /// A worker left the pool.
    WorkerRemoved(WorkerId),
    /// A worker reported a new status.
    StatusChanged(WorkerId, WorkerStatus),
}

/// Pool change notification, with the pool's availability after the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEvent {
    /// What changed.
    pub kind: PoolEventKind,
    /// Number of idle workers after the change.
    pub idle_workers: usize,
    /// Number of connected (idle or busy) workers after the change.
    pub connected_workers: usize,
}

/// Receives pool change notifications.
///
/// Listeners are called outside the pool lock and may call back into the pool.
pub trait PoolListener: Send + Sync {
    /// Called once per pool change.
    fn on_pool_event(&self, event: &PoolEvent);
}

/// Handle returned by [`WorkerPool::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Wrap a raw id, for pools implemented outside this module.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Candidate selection contract consumed by the session starter.
///
/// Implementations must be safe under concurrent use. Concurrent callers may
/// observe candidates in any order.
pub trait WorkerPool: Send + Sync {
    /// Next candidate according to pool order, or `None` if no worker can take
    /// a session. May return the same candidate on consecutive calls.
    fn select_candidate(&self) -> Option<Candidate>;

    /// Move `worker` to the back of the selection order.
    fn report_transient_error(&self, worker: &WorkerId);

    /// `worker` answered BUSY. The order is unchanged; the pool may prefer
    /// other workers until the worker is free again.
    fn report_busy(&self, worker: &WorkerId);

    /// Whether any worker is connected at all.
    fn any_connected(&self) -> bool;

    /// Register a pool change listener.
    fn subscribe(&self, listener: Arc<dyn PoolListener>) -> ListenerId;

    /// Remove a listener. Returns `false` if it was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// Worker presence feed: workers joining, leaving and reporting status.
pub trait WorkerPresence: Send + Sync {
    /// Add a worker at the back of the selection order.
    ///
    /// Re-adding a known worker updates its endpoint and status in place.
    fn add_worker(&self, id: WorkerId, endpoint: String, status: WorkerStatus);

    /// Record a status reported by a worker. Returns `false` for unknown
    /// workers.
    fn update_status(&self, id: &WorkerId, status: WorkerStatus) -> bool;

    /// Remove a worker. Returns `false` if it was not in the pool.
    fn remove_worker(&self, id: &WorkerId) -> bool;
}

#[derive(Debug, Clone)]
struct PoolMember {
    id: WorkerId,
    endpoint: String,
    status: WorkerStatus,
    /// Skipped by selection until this instant, after a BUSY reply.
    held_off_until: Option<Instant>,
}

impl PoolMember {
    fn is_held_off(&self, now: Instant) -> bool {
        self.held_off_until.is_some_and(|until| until > now)
    }

    fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

#[derive(Default)]
struct PoolState {
    members: VecDeque<PoolMember>,
    listeners: HashMap<ListenerId, Arc<dyn PoolListener>>,
}

impl PoolState {
    fn event(&self, kind: PoolEventKind) -> PoolEvent {
        PoolEvent {
            kind,
            idle_workers: self
                .members
                .iter()
                .filter(|m| m.status == WorkerStatus::Idle)
                .count(),
            connected_workers: self
                .members
                .iter()
                .filter(|m| m.status != WorkerStatus::Offline)
                .count(),
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn PoolListener>> {
        self.listeners.values().cloned().collect()
    }
}

/// Worker pool kept in process memory.
pub struct InMemoryWorkerPool {
    state: Mutex<PoolState>,
    next_listener_id: AtomicU64,
    busy_hold_off: Duration,
}

impl Default for InMemoryWorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorkerPool {
    /// Create an empty pool with the default busy hold-off.
    #[must_use]
    pub fn new() -> Self {
        Self::with_busy_hold_off(Duration::from_secs(DEFAULT_BUSY_HOLD_OFF_SECONDS))
    }

    /// Create an empty pool that skips a BUSY worker for `busy_hold_off`.
    #[must_use]
    pub fn with_busy_hold_off(busy_hold_off: Duration) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            next_listener_id: AtomicU64::new(0),
            busy_hold_off,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Every mutation is a single step, so a poisoned lock still holds a valid order.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(listeners: Vec<Arc<dyn PoolListener>>, event: &PoolEvent) {
        for listener in listeners {
            listener.on_pool_event(event);
        }
    }

    /// Worker ids in current selection order.
    #[must_use]
    pub fn worker_order(&self) -> Vec<WorkerId> {
        self.lock().members.iter().map(|m| m.id.clone()).collect()
    }
}

impl WorkerPresence for InMemoryWorkerPool {
    fn add_worker(&self, id: WorkerId, endpoint: String, status: WorkerStatus) {
        let (listeners, event) = {
            let mut state = self.lock();
            if let Some(member) = state.members.iter_mut().find(|m| m.id == id) {
                member.endpoint = endpoint;
                member.status = status;
                member.held_off_until = None;
            } else {
                state.members.push_back(PoolMember {
                    id: id.clone(),
                    endpoint,
                    status,
                    held_off_until: None,
                });
            }
            (state.listeners(), state.event(PoolEventKind::WorkerAdded(id)))
        };

        info!(
            target: "bc.service.worker_pool",
            event = ?event.kind,
            idle_workers = event.idle_workers,
            "Worker added to pool"
        );
        Self::notify(listeners, &event);
    }

    fn remove_worker(&self, id: &WorkerId) -> bool {
        let (listeners, event) = {
            let mut state = self.lock();
            let before = state.members.len();
            state.members.retain(|m| &m.id != id);
            if state.members.len() == before {
                return false;
            }
            (
                state.listeners(),
                state.event(PoolEventKind::WorkerRemoved(id.clone())),
            )
        };

        info!(
            target: "bc.service.worker_pool",
            worker = %id,
            idle_workers = event.idle_workers,
            "Worker removed from pool"
        );
        Self::notify(listeners, &event);
        true
    }

    fn update_status(&self, id: &WorkerId, status: WorkerStatus) -> bool {
        let (listeners, event) = {
            let mut state = self.lock();
            let Some(member) = state.members.iter_mut().find(|m| &m.id == id) else {
                return false;
            };
            // A reported status supersedes any hold-off from an earlier BUSY reply
            member.held_off_until = None;
            if member.status == status {
                return true;
            }
            member.status = status;
            (
                state.listeners(),
                state.event(PoolEventKind::StatusChanged(id.clone(), status)),
            )
        };

        debug!(
            target: "bc.service.worker_pool",
            worker = %id,
            status = ?status,
            idle_workers = event.idle_workers,
            "Worker status changed"
        );
        Self::notify(listeners, &event);
        true
    }
}

impl WorkerPool for InMemoryWorkerPool {
    /// First idle worker that is not held off. When every idle worker is held
    /// off, the one whose hold-off ends first.
    fn select_candidate(&self) -> Option<Candidate> {
        let now = Instant::now();
        let state = self.lock();
        let idle: Vec<&PoolMember> = state
            .members
            .iter()
            .filter(|m| m.status == WorkerStatus::Idle)
            .collect();

        idle.iter()
            .find(|m| !m.is_held_off(now))
            .or_else(|| idle.iter().min_by_key(|m| m.held_off_until))
            .map(|m| m.candidate())
    }

    fn report_transient_error(&self, worker: &WorkerId) {
        let mut state = self.lock();
        let Some(position) = state.members.iter().position(|m| &m.id == worker) else {
            warn!(
                target: "bc.service.worker_pool",
                worker = %worker,
                "Transient error reported for unknown worker"
            );
            return;
        };

        if let Some(member) = state.members.remove(position) {
            state.members.push_back(member);
        }

        debug!(
            target: "bc.service.worker_pool",
            worker = %worker,
            "Worker moved to the back of the selection order"
        );
    }

    fn report_busy(&self, worker: &WorkerId) {
        let until = Instant::now() + self.busy_hold_off;
        let mut state = self.lock();
        let Some(member) = state.members.iter_mut().find(|m| &m.id == worker) else {
            warn!(
                target: "bc.service.worker_pool",
                worker = %worker,
                "Busy reply reported for unknown worker"
            );
            return;
        };
        member.held_off_until = Some(until);

        debug!(
            target: "bc.service.worker_pool",
            worker = %worker,
            hold_off_ms = u64::try_from(self.busy_hold_off.as_millis()).unwrap_or(u64::MAX),
            "Worker held off after a busy reply"
        );
    }

    fn any_connected(&self) -> bool {
        self.lock()
            .members
            .iter()
            .any(|m| m.status != WorkerStatus::Offline)
    }

    fn subscribe(&self, listener: Arc<dyn PoolListener>) -> ListenerId {
        let id = ListenerId::from_raw(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.lock().listeners.insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }
}
