//! HTTP boundary: status codes and the body texts load monitors depend on.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{test_config, FlakyConverter, SlowConverter};
use conversion_core::config::PipelineConfig;
use conversion_core::converters::{Converter, ConverterKind};
use conversion_core::service::ConversionService;
use conversion_core::web::{self, WebState};

fn app_for(service: Arc<ConversionService>) -> Router {
    web::router(Arc::new(WebState::new(service)))
}

fn default_service() -> Arc<ConversionService> {
    Arc::new(ConversionService::from_config(&test_config()).unwrap())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoints_report_uptime() {
    let service = default_service();

    for uri in ["/health", "/ready", "/api/health"] {
        let (status, body) = send(app_for(service.clone()), get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body["uptime"].is_number(), "{uri} missing uptime");
    }

    let (_, body) = send(app_for(service.clone()), get("/api/health")).await;
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], json!("ok"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_convert_currency() {
    let service = default_service();
    let (status, body) = send(
        app_for(service),
        post_json(
            "/api/convert/currency",
            json!({"id": "t1", "amount": 1000, "from": "EUR", "to": "USD"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["id"], json!("t1"));
    assert_eq!(body["kind"], json!("currency"));
    assert_eq!(body["output"]["formatted"], json!("$1,080.00"));
}

#[tokio::test]
async fn test_client_errors() {
    let service = default_service();

    let (status, body) = send(app_for(service.clone()), post_json("/api/convert/weather", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("weather"));

    let (status, body) = send(app_for(service.clone()), post_json("/api/convert/currency", json!({"from": "EUR"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));

    let (status, _) = send(app_for(service.clone()), post_json("/api/convert/date", json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/convert/date")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(app_for(service.clone()), malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app_for(service), post_json("/api/convert/date", json!({"date": "31/02/2024"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("CONVERSION_ERROR"));
}

#[tokio::test]
async fn test_open_breaker_returns_503_with_circuit_breaker_text() {
    let service = default_service();
    service
        .orchestrator(ConverterKind::Currency)
        .unwrap()
        .breaker()
        .force_open();

    let (status, body) = send(
        app_for(service.clone()),
        post_json("/api/convert/currency", json!({"amount": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("Circuit breaker"));

    let (status, body) = send(app_for(service), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("degraded"));
}

#[tokio::test]
async fn test_breaker_trips_from_converter_failures() {
    let config = test_config();
    let converters: Vec<(ConverterKind, Arc<dyn Converter>)> =
        vec![(ConverterKind::Currency, FlakyConverter::failing())];
    let service = Arc::new(ConversionService::with_converters(&config, converters).unwrap());

    for i in 0..config.breaker_min_samples {
        let (status, _) = send(
            app_for(service.clone()),
            post_json("/api/convert/currency", json!({"n": i})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    let (status, body) = send(
        app_for(service),
        post_json("/api/convert/currency", json!({"n": "next"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("Circuit breaker"));
}

#[tokio::test]
async fn test_timeout_returns_503_with_degradation_text() {
    let config = PipelineConfig {
        request_timeout_ms: 20,
        ..test_config()
    };
    let converters: Vec<(ConverterKind, Arc<dyn Converter>)> = vec![(
        ConverterKind::Address,
        Arc::new(SlowConverter::new(Duration::from_millis(500))),
    )];
    let service = Arc::new(ConversionService::with_converters(&config, converters).unwrap());

    let (status, body) = send(
        app_for(service.clone()),
        post_json("/api/convert/address", json!({"street": "Main", "city": "Paris"})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body).unwrap();
    let text = body["error"].as_str().unwrap();
    assert!(text.contains("temporarily unavailable"));
    assert!(text.contains("degraded"));
    assert_eq!(body["code"], json!("SERVICE_DEGRADED"));

    service.shutdown().await;
}

#[tokio::test]
async fn test_overload_returns_503_with_degradation_text() {
    let config = PipelineConfig {
        pool_concurrency: 1,
        pool_queue_capacity: 1,
        ..test_config()
    };
    let converters: Vec<(ConverterKind, Arc<dyn Converter>)> = vec![(
        ConverterKind::Date,
        Arc::new(SlowConverter::new(Duration::from_millis(300))),
    )];
    let service = Arc::new(ConversionService::with_converters(&config, converters).unwrap());

    let busy = tokio::spawn(send(
        app_for(service.clone()),
        post_json("/api/convert/date", json!({"n": 1})),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = send(
        app_for(service.clone()),
        post_json("/api/convert/date", json!({"n": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("temporarily unavailable"));
    assert_eq!(body["code"], json!("SERVICE_DEGRADED"));

    let (status, _) = busy.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    service.shutdown().await;
}

#[tokio::test]
async fn test_ready_reports_503_after_shutdown() {
    let service = default_service();
    service.shutdown().await;

    let (status, body) = send(app_for(service.clone()), get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["error"].is_string());

    // Liveness stays green
    let (status, _) = send(app_for(service), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_prometheus_text() {
    let service = default_service();
    let app = app_for(service.clone());

    send(app.clone(), post_json("/api/convert/currency", json!({"amount": 2}))).await;
    send(app.clone(), post_json("/api/convert/currency", json!({"amount": 2}))).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("conversion_cache_hits_total 1"));
    assert!(text.contains("conversion_cache_misses_total 1"));
    assert!(text.contains("conversion_responses_total{status=\"200\"} 2"));
    assert!(text.contains("conversion_circuit_breaker_state{converter=\"currency\"} 0"));
}
