//! Broadcast Controller (BC) Service
//!
//! Starts recording, live streaming and SIP call sessions on broadcaster
//! workers, failing over between workers when one cannot take a session.
//!
//! # Startup
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing
//! 3. Initialize Prometheus metrics recorder
//! 4. Build the worker pool from `BC_WORKERS`
//! 5. Serve the API, stats, health and metrics endpoints
//! 6. Wait for shutdown signal, then cancel in-flight starts and drain

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use bc_service::config::Config;
use bc_service::handlers;
use bc_service::observability::metrics::{init_metrics_recorder, WorkerAvailabilityListener};
use bc_service::observability::{FailureCounters, HealthState};
use bc_service::routes::{build_routes, AppState};
use bc_service::services::{
    BroadcasterTransport, HttpBroadcasterClient, InMemoryWorkerPool, WorkerPool, WorkerPresence,
    WorkerStatus,
};
use common::config::{ObservabilityConfig, DEFAULT_LOG_FILTER};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    init_tracing(&config.observability);

    info!("Starting Broadcast Controller");
    info!(
        bc_id = %config.bc_id,
        bind_address = %config.bind_address,
        max_start_retries = config.max_start_retries,
        pending_timeout_seconds = config.pending_timeout.as_secs(),
        worker_request_timeout_seconds = config.worker_request_timeout.as_secs(),
        busy_hold_off_seconds = config.busy_hold_off.as_secs(),
        workers = config.workers.len(),
        "Configuration loaded successfully"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    // Configured workers start idle; later changes arrive on /v1/workers
    let pool = Arc::new(InMemoryWorkerPool::with_busy_hold_off(config.busy_hold_off));
    pool.subscribe(Arc::new(WorkerAvailabilityListener));
    for worker in &config.workers {
        pool.add_worker(worker.id.clone(), worker.endpoint.clone(), WorkerStatus::Idle);
    }

    let transport = HttpBroadcasterClient::new(config.worker_request_timeout).map_err(|e| {
        error!(error = %e, "Failed to create broadcaster client");
        e
    })?;

    let bind_address: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    let presence: Arc<dyn WorkerPresence> = pool.clone();
    let pool: Arc<dyn WorkerPool> = pool;
    let transport: Arc<dyn BroadcasterTransport> = Arc::new(transport);
    let shutdown_token = CancellationToken::new();
    let health_state = Arc::new(HealthState::new(Arc::clone(&pool)));

    let state = Arc::new(AppState {
        config,
        pool,
        presence,
        transport,
        counters: FailureCounters::new(),
        shutdown: shutdown_token.clone(),
    });

    let metrics_router = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(prometheus_handle);
    let app = build_routes(state, Arc::clone(&health_state)).merge(metrics_router);

    // Bind before serving to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %bind_address, "Failed to bind HTTP server");
            format!("Failed to bind HTTP server to {bind_address}: {e}")
        })?;
    info!(addr = %bind_address, "Broadcast Controller listening");

    let server_health = Arc::clone(&health_state);
    let server_token = shutdown_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, initiating graceful shutdown...");

            // Stop advertising readiness, then end in-flight starts
            server_health.set_not_ready();
            server_token.cancel();
        })
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e
        })?;

    info!("Broadcast Controller shutdown complete");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&observability.log_filter)
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
