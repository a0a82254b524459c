//! HTTP API integration tests.
//!
//! Exercises the router end to end with a mock pool and mock broadcaster:
//! session start status codes, the stats snapshot, and readiness. Worker
//! presence routes run against the in-memory pool.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bc_service::observability::HealthState;
use bc_service::routes::{build_routes, AppState};
use bc_service::services::worker_pool::{PoolEvent, PoolEventKind, PoolListener};
use bc_service::services::{InMemoryWorkerPool, WorkerPool, WorkerPresence, WorkerStatus};
use bc_test_utils::{test_app_state, MockBroadcaster, MockWorkerPool, ScriptedReply};
use common::types::WorkerId;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

struct TestApp {
    state: Arc<AppState>,
    health: Arc<HealthState>,
    broadcaster: Arc<MockBroadcaster>,
}

impl TestApp {
    fn new(pool: MockWorkerPool, broadcaster: MockBroadcaster) -> Self {
        Self::with_pool(Arc::new(pool), broadcaster)
    }

    fn with_pool<P>(pool: Arc<P>, broadcaster: MockBroadcaster) -> Self
    where
        P: WorkerPool + WorkerPresence + 'static,
    {
        let broadcaster = Arc::new(broadcaster);
        let state = test_app_state(Arc::clone(&pool), broadcaster.clone());
        let health = Arc::new(HealthState::new(pool));
        Self {
            state,
            health,
            broadcaster,
        }
    }

    fn router(&self) -> Router {
        build_routes(Arc::clone(&self.state), Arc::clone(&self.health))
    }

    async fn post_session(&self, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/sessions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(self.router(), request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(self.router(), request).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(self.router(), request).await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        send(self.router(), request).await
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn recording_body() -> Value {
    json!({
        "room": "room@bar.com",
        "initiator": "foo@bar.com",
        "kind": "RECORDING",
        "session_id": "session-1"
    })
}

// ============================================================================
// POST /v1/sessions
// ============================================================================

#[tokio::test]
async fn test_start_session_created_after_failover() {
    let app = TestApp::new(
        MockWorkerPool::returning_many(&["jibri1@bar.com", "jibri2@bar.com"]),
        MockBroadcaster::replying(vec![ScriptedReply::ServiceUnavailable, ScriptedReply::Pending]),
    );

    let (status, body) = app.post_session(recording_body()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["session_id"], "session-1");
    assert_eq!(body["kind"], "RECORDING");
    assert_eq!(body["worker"], "jibri2@bar.com");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["attempts"], 2);
    assert_eq!(app.broadcaster.call_count(), 2);
}

#[tokio::test]
async fn test_start_session_retries_exhausted_is_503() {
    let app = TestApp::new(
        MockWorkerPool::single("solo"),
        MockBroadcaster::always(ScriptedReply::Busy),
    );

    let (status, body) = app.post_session(recording_body()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "RETRIES_EXHAUSTED");
    // test_config sets N = 2
    assert_eq!(app.broadcaster.call_count(), 3);
}

#[tokio::test]
async fn test_start_session_no_worker_is_503() {
    let app = TestApp::new(
        MockWorkerPool::disconnected(),
        MockBroadcaster::always(ScriptedReply::Pending),
    );

    let (status, body) = app.post_session(recording_body()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "NO_CANDIDATE_AVAILABLE");
    assert_eq!(app.broadcaster.call_count(), 0);
}

#[tokio::test]
async fn test_start_session_fatal_reply_is_502() {
    let app = TestApp::new(
        MockWorkerPool::returning_many(&["a", "b"]),
        MockBroadcaster::always(ScriptedReply::Fatal),
    );

    let (status, body) = app.post_session(recording_body()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "FATAL_REPLY");
    assert_eq!(app.broadcaster.call_count(), 1);
}

#[tokio::test]
async fn test_start_session_validation_is_400() {
    let app = TestApp::new(
        MockWorkerPool::single("a"),
        MockBroadcaster::always(ScriptedReply::Pending),
    );

    for body in [
        json!({"room": "", "initiator": "foo@bar.com", "kind": "RECORDING"}),
        json!({"room": "room@bar.com", "initiator": " ", "kind": "RECORDING"}),
        json!({"room": "room@bar.com", "initiator": "foo@bar.com", "kind": "SIP_CALL"}),
        json!({"room": "room@bar.com", "initiator": "foo@bar.com", "kind": "LIVE_STREAMING"}),
        json!({
            "room": "room@bar.com", "initiator": "foo@bar.com", "kind": "RECORDING",
            "session_id": ""
        }),
    ] {
        let (status, response) = app.post_session(body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(response["error"]["code"], "BAD_REQUEST");
    }

    assert_eq!(app.broadcaster.call_count(), 0);
}

#[tokio::test]
async fn test_start_session_after_shutdown_is_cancelled() {
    let app = TestApp::new(
        MockWorkerPool::single("a"),
        MockBroadcaster::always(ScriptedReply::Pending),
    );
    app.state.shutdown.cancel();

    let (status, body) = app.post_session(recording_body()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "CANCELLED");
    assert_eq!(app.broadcaster.call_count(), 0);

    let (_, stats) = app.get("/v1/stats").await;
    assert_eq!(stats["total_recording_failures"], 0);
}

#[tokio::test]
async fn test_live_streaming_key_reaches_worker() {
    let app = TestApp::new(
        MockWorkerPool::single("a"),
        MockBroadcaster::always(ScriptedReply::Pending),
    );

    let (status, _) = app
        .post_session(json!({
            "room": "room@bar.com",
            "initiator": "foo@bar.com",
            "kind": "LIVE_STREAMING",
            "stream_id": "live-key"
        }))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let envelopes = app.broadcaster.envelopes();
    assert_eq!(envelopes.len(), 1);
    assert!(envelopes[0].stream_id.is_some());
}

// ============================================================================
// GET /v1/stats
// ============================================================================

#[tokio::test]
async fn test_stats_starts_at_zero() {
    let app = TestApp::new(
        MockWorkerPool::single("a"),
        MockBroadcaster::always(ScriptedReply::Pending),
    );

    let (status, body) = app.get("/v1/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "total_live_streaming_failures": 0,
            "total_recording_failures": 0,
            "total_sip_call_failures": 0
        })
    );
}

#[tokio::test]
async fn test_stats_counts_failed_starts_per_kind() {
    let app = TestApp::new(
        MockWorkerPool::single("solo"),
        MockBroadcaster::always(ScriptedReply::ServiceUnavailable),
    );

    app.post_session(recording_body()).await;
    app.post_session(recording_body()).await;
    app.post_session(json!({
        "room": "room@bar.com",
        "initiator": "foo@bar.com",
        "kind": "SIP_CALL",
        "sip_address": "sip:conf@example.com"
    }))
    .await;

    let (_, body) = app.get("/v1/stats").await;
    assert_eq!(
        body,
        json!({
            "total_live_streaming_failures": 0,
            "total_recording_failures": 2,
            "total_sip_call_failures": 1
        })
    );
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_ready_with_connected_workers() {
    let app = TestApp::new(
        MockWorkerPool::single("a"),
        MockBroadcaster::always(ScriptedReply::Pending),
    );

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_not_ready_without_workers_or_after_shutdown() {
    let app = TestApp::new(
        MockWorkerPool::disconnected(),
        MockBroadcaster::always(ScriptedReply::Pending),
    );
    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["workers_connected"], false);
    assert_eq!(body["accepting"], true);

    let app = TestApp::new(
        MockWorkerPool::single("a"),
        MockBroadcaster::always(ScriptedReply::Pending),
    );
    app.health.set_not_ready();
    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["accepting"], false);

    // Liveness is unaffected
    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Worker presence
// ============================================================================

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<PoolEvent>>,
}

impl PoolListener for RecordingListener {
    fn on_pool_event(&self, event: &PoolEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn presence_app(broadcaster: MockBroadcaster) -> (TestApp, Arc<InMemoryWorkerPool>) {
    let pool = Arc::new(InMemoryWorkerPool::new());
    (TestApp::with_pool(Arc::clone(&pool), broadcaster), pool)
}

async fn register(app: &TestApp, id: &str) {
    let (status, _) = app
        .put(
            &format!("/v1/workers/{id}"),
            json!({"endpoint": format!("http://{id}:3333/")}),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_registered_workers_join_the_pool() {
    let (app, pool) = presence_app(MockBroadcaster::always(ScriptedReply::Pending));

    let (status, _) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    register(&app, "jibri1").await;
    register(&app, "jibri2").await;

    assert_eq!(
        pool.worker_order(),
        vec![WorkerId::new("jibri1"), WorkerId::new("jibri2")]
    );
    let candidate = pool.select_candidate().unwrap();
    assert_eq!(candidate.endpoint, "http://jibri1:3333");

    let (status, _) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_busy_status_steers_sessions_to_idle_worker() {
    let (app, _pool) = presence_app(MockBroadcaster::always(ScriptedReply::Pending));
    register(&app, "a").await;
    register(&app, "b").await;

    let (status, _) = app
        .put("/v1/workers/a/status", json!({"status": "busy"}))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.post_session(recording_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["worker"], "b");
    assert_eq!(body["attempts"], 1);

    // Back to idle: a is at the head again
    app.put("/v1/workers/a/status", json!({"status": "idle"}))
        .await;
    let (_, body) = app.post_session(recording_body()).await;
    assert_eq!(body["worker"], "a");
    assert_eq!(
        app.broadcaster.addressed_to(),
        vec![WorkerId::new("b"), WorkerId::new("a")]
    );
}

#[tokio::test]
async fn test_presence_changes_reach_pool_listeners() {
    let (app, pool) = presence_app(MockBroadcaster::always(ScriptedReply::Pending));
    let listener = Arc::new(RecordingListener::default());
    pool.subscribe(listener.clone());

    register(&app, "a").await;
    app.put("/v1/workers/a/status", json!({"status": "busy"}))
        .await;
    let (status, _) = app.delete("/v1/workers/a").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let events = listener.events.lock().unwrap().clone();
    let kinds: Vec<_> = events.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            PoolEventKind::WorkerAdded(WorkerId::new("a")),
            PoolEventKind::StatusChanged(WorkerId::new("a"), WorkerStatus::Busy),
            PoolEventKind::WorkerRemoved(WorkerId::new("a")),
        ]
    );
    assert_eq!(
        events.iter().map(|e| e.idle_workers).collect::<Vec<_>>(),
        vec![1, 0, 0]
    );
}

#[tokio::test]
async fn test_unknown_worker_is_404() {
    let (app, _pool) = presence_app(MockBroadcaster::always(ScriptedReply::Pending));

    let (status, body) = app
        .put("/v1/workers/ghost/status", json!({"status": "idle"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    register(&app, "a").await;
    let (status, _) = app.delete("/v1/workers/a").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.delete("/v1/workers/a").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_register_rejects_non_http_endpoint() {
    let (app, pool) = presence_app(MockBroadcaster::always(ScriptedReply::Pending));

    let (status, body) = app
        .put("/v1/workers/a", json!({"endpoint": "ftp://a:21"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(pool.worker_order().is_empty());
}
