//! VRF Oracle Operator
//!
//! Off-chain service that holds the oracle's ECVRF secret key, monitors the
//! oracle program for randomness requests and fulfills them with proofs.
//! Runs three concurrent subsystems:
//!
//! - **Listener**: WebSocket subscription to on-chain events + startup catch-up scan.
//! - **Fulfiller**: Consumes request events, proves, and submits fulfillment transactions.
//! - **HTTP server**: Liveness (`/health`), readiness (`/status`) and `/metrics`.

use actix_web::{web, App, HttpResponse, HttpServer};
use solana_sdk::signature::Signer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod consumer_accounts;
mod fulfiller;
mod listener;
mod metrics;
mod prover;

use config::AppConfig;
use metrics::Metrics;

/// Shared application state accessible from HTTP handlers.
struct AppState {
    /// Number of fulfillment transactions currently in-flight.
    pending_count: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
}

/// Liveness probe: returns 200 if the process is running.
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Readiness / status probe: reports the number of in-flight fulfillments.
async fn status(data: web::Data<AppState>) -> HttpResponse {
    let pending = data.pending_count.load(Ordering::Relaxed);
    HttpResponse::Ok().json(serde_json::json!({
        "status": "running",
        "pending_fulfillments": pending
    }))
}

async fn metrics_report(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.metrics.snapshot())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,solana_client=warn,solana_rpc_client=warn,hyper=warn")),
        )
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = AppConfig::from_env()
        .map_err(|e| std::io::Error::other(format!("invalid configuration: {e:#}")))?;

    info!(
        program = %config.program_id,
        operator = %config.operator_keypair.pubkey(),
        verifying_key = %hex::encode(config.vrf_secret.verifying_key().as_bytes()),
        "Starting VRF operator"
    );
    info!(rpc = %config.rpc_url, ws = %config.ws_url, "Endpoints configured");

    let pending_count = Arc::new(AtomicU64::new(0));
    let metrics = Arc::new(Metrics::new());
    let (tx, rx) = mpsc::channel(256);

    // Scan for any requests that arrived while the operator was offline.
    listener::catch_up_pending_requests(&config, &tx).await;

    // Background: stream on-chain events and forward to the fulfiller.
    let listener_config = config.clone();
    let listener_tx = tx.clone();
    tokio::spawn(async move {
        listener::listen_for_events(listener_config, listener_tx).await;
    });

    // Background: consume events and submit fulfillment transactions.
    let fulfiller_config = config.clone();
    let fulfiller_pending = pending_count.clone();
    let fulfiller_metrics = metrics.clone();
    tokio::spawn(async move {
        fulfiller::run_fulfiller(fulfiller_config, rx, fulfiller_pending, fulfiller_metrics).await;
    });

    let state = web::Data::new(AppState {
        pending_count,
        metrics,
    });

    let addr = ("0.0.0.0", config.http_port);
    info!(port = config.http_port, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .route("/status", web::get().to(status))
            .route("/metrics", web::get().to(metrics_report))
    })
    .bind(addr)?
    .run()
    .await
}
