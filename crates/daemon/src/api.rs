//! HTTP surface for health checks, metrics, processor status and reading ingest

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thermal_engine::{
    health::{ComponentStatus, HealthRegistry},
    Alert, EnqueueOutcome, Processor, ProcessorStatus, Thresholds,
};
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub processor: Arc<Processor>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, processor: Arc<Processor>) -> Self {
        Self {
            health_registry,
            processor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub processor: ProcessorStatus,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub hostname: String,
    pub serial: String,
    pub temperature: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// False when the queue was full and the reading was evaluated inline
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

/// 200 while operational (degraded included), 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        processor: state.processor.status(),
        thresholds: state.processor.engine().thresholds(),
    })
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Response {
    if request.hostname.trim().is_empty() || request.serial.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "hostname and serial must not be empty",
        )
            .into_response();
    }

    // The inline fallback touches SQLite, keep it off the async workers
    let processor = Arc::clone(&state.processor);
    let outcome = tokio::task::spawn_blocking(move || {
        processor.enqueue(&request.hostname, &request.serial, request.temperature)
    })
    .await;

    match outcome {
        Ok(EnqueueOutcome::Queued) => (
            StatusCode::ACCEPTED,
            Json(IngestResponse {
                queued: true,
                alert: None,
            }),
        )
            .into_response(),
        Ok(EnqueueOutcome::Inline(alert)) => (
            StatusCode::OK,
            Json(IngestResponse {
                queued: false,
                alert,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Ingest task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .route("/ingest", post(ingest))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
