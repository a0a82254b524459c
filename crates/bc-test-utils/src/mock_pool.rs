//! Mock worker pool for session start testing.
//!
//! Hands out a fixed sequence of candidates (the last entry repeats) and
//! records every call in order, so tests can assert on what was selected,
//! which workers were reported, and that a report came before the next
//! selection. Presence updates are recorded too; they never change the
//! script.
//!
//! # Example
//!
//! ```rust,ignore
//! use bc_test_utils::MockWorkerPool;
//!
//! let pool = MockWorkerPool::returning_many(&["jibri1", "jibri2", "jibri3"]);
//! // ... run a start ...
//! assert_eq!(pool.transient_reports(), vec![WorkerId::new("jibri1")]);
//! ```

use bc_service::services::worker_pool::{
    Candidate, ListenerId, PoolListener, WorkerPool, WorkerPresence, WorkerStatus,
};
use common::types::WorkerId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A call made on the mock pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolCall {
    AnyConnected,
    /// A selection and the worker it returned.
    Select(Option<WorkerId>),
    TransientError(WorkerId),
    Busy(WorkerId),
    Added(WorkerId, WorkerStatus),
    StatusUpdate(WorkerId, WorkerStatus),
    Removed(WorkerId),
}

/// Scripted worker pool.
pub struct MockWorkerPool {
    script: Vec<Option<Candidate>>,
    connected: bool,
    next: AtomicUsize,
    calls: Mutex<Vec<PoolCall>>,
    listeners: AtomicUsize,
}

/// Candidate for `id` at a fake endpoint.
#[must_use]
pub fn candidate(id: &str) -> Candidate {
    Candidate {
        id: WorkerId::new(id),
        endpoint: format!("http://{id}:3333"),
    }
}

impl MockWorkerPool {
    /// Pool whose selections follow `script`; `None` means no candidate.
    /// The last entry repeats once the script runs out.
    #[must_use]
    pub fn scripted(script: Vec<Option<&str>>) -> Self {
        Self {
            script: script.into_iter().map(|id| id.map(candidate)).collect(),
            connected: true,
            next: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            listeners: AtomicUsize::new(0),
        }
    }

    /// Pool that returns `ids` in order, then keeps returning the last one.
    #[must_use]
    pub fn returning_many(ids: &[&str]) -> Self {
        Self::scripted(ids.iter().map(|id| Some(*id)).collect())
    }

    /// Pool that always returns the same worker.
    #[must_use]
    pub fn single(id: &str) -> Self {
        Self::returning_many(&[id])
    }

    /// Connected pool with no candidate to offer.
    #[must_use]
    pub fn empty() -> Self {
        Self::scripted(vec![None])
    }

    /// Pool reporting that no worker is connected.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::empty()
        }
    }

    /// Every call, in order.
    pub fn calls(&self) -> Vec<PoolCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `select_candidate` calls.
    pub fn select_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PoolCall::Select(_)))
            .count()
    }

    /// Workers reported with a transient error, in order.
    pub fn transient_reports(&self) -> Vec<WorkerId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PoolCall::TransientError(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Workers reported busy, in order.
    pub fn busy_reports(&self) -> Vec<WorkerId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PoolCall::Busy(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn scripts(&self, id: &WorkerId) -> bool {
        self.script.iter().flatten().any(|c| &c.id == id)
    }

    fn record(&self, call: PoolCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WorkerPool for MockWorkerPool {
    fn select_candidate(&self) -> Option<Candidate> {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        let selected = self
            .script
            .get(i)
            .or_else(|| self.script.last())
            .cloned()
            .flatten();
        self.record(PoolCall::Select(selected.as_ref().map(|c| c.id.clone())));
        selected
    }

    fn report_transient_error(&self, worker: &WorkerId) {
        self.record(PoolCall::TransientError(worker.clone()));
    }

    fn report_busy(&self, worker: &WorkerId) {
        self.record(PoolCall::Busy(worker.clone()));
    }

    fn any_connected(&self) -> bool {
        self.record(PoolCall::AnyConnected);
        self.connected
    }

    fn subscribe(&self, _listener: Arc<dyn PoolListener>) -> ListenerId {
        let n = self.listeners.fetch_add(1, Ordering::SeqCst);
        ListenerId::from_raw(n as u64)
    }

    fn unsubscribe(&self, _id: ListenerId) -> bool {
        self.listeners
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl WorkerPresence for MockWorkerPool {
    fn add_worker(&self, id: WorkerId, _endpoint: String, status: WorkerStatus) {
        self.record(PoolCall::Added(id, status));
    }

    fn update_status(&self, id: &WorkerId, status: WorkerStatus) -> bool {
        self.record(PoolCall::StatusUpdate(id.clone(), status));
        self.scripts(id)
    }

    fn remove_worker(&self, id: &WorkerId) -> bool {
        self.record(PoolCall::Removed(id.clone()));
        self.scripts(id)
    }
}
