//! API Routes
//!
//! HTTP endpoints for health checks, status, peers and metrics

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::Metrics;
use crate::config::SeedConfig;
use crate::directory::NetworkView;
use crate::dns::codec;
use crate::types::PeerRecord;

/// Peers listed by GET /peers
const MAX_LISTED_PEERS: usize = 50;

/// Shared API state
pub struct ApiState {
    pub config: Arc<SeedConfig>,
    pub directory: Arc<NetworkView>,
    pub metrics: Arc<Metrics>,
}

/// Run the HTTP API server
pub async fn run_api_server(
    config: Arc<SeedConfig>,
    directory: Arc<NetworkView>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let addr = config.api_addr();
    let state = Arc::new(ApiState {
        config,
        directory,
        metrics,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("📊 HTTP API server listening on {}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health_check))
        .route("/status", get(get_status))

        // Directory
        .route("/peers", get(get_peers))

        // Metrics
        .route("/metrics", get(get_metrics_prometheus))
        .route("/metrics/json", get(get_metrics_json))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /status - Detailed status
async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let stats = state.directory.stats();

    let status = serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.metrics.uptime_secs(),
        "apex_domain": state.config.apex(),
        "dns_port": state.config.dns_port,
        "directory": {
            "total_peers": stats.total_peers,
            "ipv4_peers": stats.ipv4_peers,
            "ipv6_peers": stats.ipv6_peers,
        }
    });

    Json(status)
}

/// GET /peers - Peers in the directory (limited)
async fn get_peers(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let apex = state.config.apex();
    let peers = state.directory.peers();

    let listed: Vec<_> = peers
        .iter()
        .take(MAX_LISTED_PEERS)
        .map(|p| {
            let record = PeerRecord::from(p.as_ref());
            serde_json::json!({
                "id": record.id,
                "address": record.address,
                "port": record.port,
                "type": record.kind,
                "family": p.family(),
                "flags": p.kind.extra_bits(),
                "dns_name": codec::peer_domain(&p.id, &apex),
            })
        })
        .collect();

    Json(serde_json::json!({
        "total": peers.len(),
        "count": listed.len(),
        "peers": listed,
    }))
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.metrics.set_directory_stats(&state.directory.stats());

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
}

/// GET /metrics/json - JSON format metrics
async fn get_metrics_json(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.metrics.set_directory_stats(&state.directory.stats());

    Json(state.metrics.to_json())
}
