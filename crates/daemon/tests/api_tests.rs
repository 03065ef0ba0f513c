//! Integration tests for the daemon API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tempfile::TempDir;
use thermal_engine::{
    health::{components, HealthRegistry},
    AlertEngine, AlertFilter, Processor, ProcessorConfig, SpikeDetector, StaticSettings, Store,
};
use thermwatch_daemon::api::{create_router, AppState};
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    store: Store,
    state: Arc<AppState>,
}

impl TestApp {
    fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}

/// Processor is left unstarted so queued readings stay in the queue
async fn setup_test_app(queue_capacity: usize) -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("api.db")).unwrap();

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let engine = Arc::new(AlertEngine::new(
        store.clone(),
        Arc::new(StaticSettings::new()),
    ));
    let processor = Processor::new(
        engine,
        SpikeDetector::new(store.clone()),
        health_registry.clone(),
        ProcessorConfig {
            queue_capacity,
            ..Default::default()
        },
    );

    TestApp {
        _dir: dir,
        store,
        state: Arc::new(AppState::new(health_registry, Arc::new(processor))),
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let app = setup_test_app(8).await;

    let (status, body) = get(app.router(), "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["detector"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let app = setup_test_app(8).await;
    app.state
        .health_registry
        .set_degraded(components::CLEANUP, "database is locked")
        .await;

    let (status, body) = get(app.router(), "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["cleanup"]["message"], "database is locked");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let app = setup_test_app(8).await;
    app.state
        .health_registry
        .set_unhealthy(components::STORE, "disk full")
        .await;

    let (status, body) = get(app.router(), "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_registry() {
    let app = setup_test_app(8).await;

    let (status, body) = get(app.router(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    app.state.health_registry.set_ready(true).await;
    let (status, body) = get(app.router(), "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
    assert!(readiness.get("reason").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup_test_app(1).await;

    // Force at least one engine metric family to exist
    post_json(
        app.router(),
        "/ingest",
        serde_json::json!({"hostname": "nas01", "serial": "SN1", "temperature": 30}),
    )
    .await;
    post_json(
        app.router(),
        "/ingest",
        serde_json::json!({"hostname": "nas01", "serial": "SN1", "temperature": 31}),
    )
    .await;

    let (status, body) = get(app.router(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("thermwatch_inline_evaluations_total"));
}

#[tokio::test]
async fn test_status_reports_queue() {
    let app = setup_test_app(4).await;
    post_json(
        app.router(),
        "/ingest",
        serde_json::json!({"hostname": "nas01", "serial": "SN1", "temperature": 40}),
    )
    .await;

    let (status, body) = get(app.router(), "/status").await;
    assert_eq!(status, StatusCode::OK);

    let response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["processor"]["running"], false);
    assert_eq!(response["processor"]["queue_depth"], 1);
    assert_eq!(response["processor"]["queue_capacity"], 4);
    assert_eq!(response["thresholds"]["warning"], 45);
    assert_eq!(response["thresholds"]["critical"], 55);
}

#[tokio::test]
async fn test_ingest_falls_back_to_inline_when_full() {
    let app = setup_test_app(1).await;

    let (status, body) = post_json(
        app.router(),
        "/ingest",
        serde_json::json!({"hostname": "nas01", "serial": "SN1", "temperature": 40}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["queued"], true);

    let (status, body) = post_json(
        app.router(),
        "/ingest",
        serde_json::json!({"hostname": "nas01", "serial": "SN2", "temperature": 60}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["queued"], false);
    assert_eq!(response["alert"]["alert_type"], "critical");

    let alerts = app.store.get_alerts(&AlertFilter::default()).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].serial, "SN2");
}

#[tokio::test]
async fn test_ingest_rejects_blank_identity() {
    let app = setup_test_app(4).await;

    let (status, _) = post_json(
        app.router(),
        "/ingest",
        serde_json::json!({"hostname": " ", "serial": "SN1", "temperature": 40}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.state.processor.status().queue_depth, 0);
}
