//! Health check endpoint.
//!
//! Serves the link status as JSON on `/health`, plus `/ready` and `/live`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use telemetry_link::TelemetryClient;
use telemetry_link::transport::{LinkStats, LinkStatus};
use tracing::info;

/// Activity counters, as served.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsView {
    pub connects: u64,
    pub disconnects: u64,
    pub snapshots: u64,
    pub heartbeats_received: u64,
    pub decode_errors: u64,
    pub heartbeats_sent: u64,
}

impl From<LinkStats> for StatsView {
    fn from(stats: LinkStats) -> Self {
        Self {
            connects: stats.connects,
            disconnects: stats.disconnects,
            snapshots: stats.snapshots,
            heartbeats_received: stats.transport_heartbeats + stats.application_heartbeats,
            decode_errors: stats.decode_errors,
            heartbeats_sent: stats.heartbeats_sent,
        }
    }
}

/// Health status.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service mode (monitor or source).
    pub mode: &'static str,
    /// Whether connected to the source (monitor only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    /// Connected but no fresh data (monitor only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    /// Milliseconds since the last liveness proof (monitor only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age_ms: Option<u64>,
    /// Current target address (monitor only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Sequence of the latest snapshot (monitor only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
    /// Failed reconnects in the current streak (monitor only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_attempt: Option<u32>,
    /// Link counters (monitor only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsView>,
    /// Connected consumers (source only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<usize>,
}

impl HealthStatus {
    fn monitor(status: &LinkStatus, sequence: Option<i64>) -> Self {
        Self {
            healthy: status.state.is_connected() && !status.stale,
            mode: "monitor",
            connected: Some(status.state.is_connected()),
            stale: Some(status.stale),
            data_age_ms: status.data_age.map(|age| age.as_millis() as u64),
            target: status.target.map(|addr| addr.to_string()),
            sequence,
            reconnect_attempt: Some(status.reconnect_attempt),
            stats: Some(status.stats.into()),
            sessions: None,
        }
    }

    fn source(sessions: usize) -> Self {
        Self {
            healthy: true,
            mode: "source",
            connected: None,
            stale: None,
            data_age_ms: None,
            target: None,
            sequence: None,
            reconnect_attempt: None,
            stats: None,
            sessions: Some(sessions),
        }
    }
}

/// Shared state for health endpoint.
#[derive(Clone)]
pub enum HealthState {
    /// Reports the client's link status.
    Monitor(Arc<TelemetryClient>),
    /// Reports connected consumers.
    Source(Arc<AtomicUsize>),
}

impl HealthState {
    /// Get current status.
    pub fn status(&self) -> HealthStatus {
        match self {
            Self::Monitor(client) => {
                let sequence = client.snapshot().map(|s| s.sequence);
                HealthStatus::monitor(&client.status(), sequence)
            }
            Self::Source(sessions) => HealthStatus::source(sessions.load(Ordering::Relaxed)),
        }
    }
}

/// Health check handler.
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let status = state.status();
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// Readiness handler (same as health).
async fn ready_handler(State(state): State<HealthState>) -> impl IntoResponse {
    health_handler(State(state)).await
}

/// Liveness handler (always returns OK if the process is running).
async fn live_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the health check server.
pub async fn start_health_server(bind_addr: SocketAddr, state: HealthState) -> std::io::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "Health server listening");
    axum::serve(listener, app).await
}
