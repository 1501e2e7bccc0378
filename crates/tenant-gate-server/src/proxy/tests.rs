// crates/tenant-gate-server/src/proxy/tests.rs
// ============================================================================
// Module: Upstream Proxy Tests
// Description: Unit tests for request forwarding and header filtering.
// Purpose: Validate pass-through, correlation header, and failure mapping.
// Dependencies: tenant-gate-server, axum
// ============================================================================

//! ## Overview
//! Exercises the proxy against an in-memory echo upstream, asserting that
//! method, path, query, and body survive the hop, that the correlation id is
//! attached, and that transport failures map to the gateway's 502 payload.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use serde_json::json;
use tenant_gate_config::UpstreamConfig;
use tokio::sync::oneshot;

use super::UpstreamProxy;
use super::filter_headers;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

async fn echo_handler(request: Request) -> Json<serde_json::Value> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.expect("body");
    Json(json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "request_id": parts.headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        "host": parts.headers.get("host").and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&bytes),
    }))
}

async fn spawn_echo_upstream() -> (String, oneshot::Sender<()>) {
    let app = Router::new().fallback(echo_handler);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    (format!("http://{}", addr), shutdown_tx)
}

fn proxy_with_base(base_url: String, max_body_bytes: usize) -> UpstreamProxy {
    let upstream = UpstreamConfig {
        base_url,
        connect_timeout_ms: 250,
        request_timeout_ms: 1_000,
    };
    UpstreamProxy::from_config(&upstream, max_body_bytes).expect("proxy")
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes =
        axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

// ============================================================================
// SECTION: Forwarding Tests
// ============================================================================

#[test]
fn base_url_trimmed_on_construction() {
    let proxy = proxy_with_base("http://upstream.local/".to_string(), 1_024);
    assert_eq!(proxy.base_url, "http://upstream.local");
}

#[tokio::test]
async fn forward_preserves_method_path_query_and_body() {
    let (base_url, shutdown_tx) = spawn_echo_upstream().await;
    let proxy = proxy_with_base(base_url, 1_024 * 1_024);
    let request = Request::builder()
        .method("POST")
        .uri("/api/2.0/mlflow/runs/create?run_name=demo")
        .header("x-mlflow-namespace", "team-a")
        .body(Body::from("{\"experiment_id\":\"7\"}"))
        .expect("request");

    let response = proxy.forward("req-01", request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = response_json(response).await;
    assert_eq!(payload["method"], "POST");
    assert_eq!(payload["uri"], "/api/2.0/mlflow/runs/create?run_name=demo");
    assert_eq!(payload["request_id"], "req-01");
    assert_eq!(payload["body"], "{\"experiment_id\":\"7\"}");
    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn forward_strips_inbound_host_header() {
    let (base_url, shutdown_tx) = spawn_echo_upstream().await;
    let proxy = proxy_with_base(base_url, 1_024);
    let request = Request::builder()
        .method("GET")
        .uri("/api/2.0/mlflow/experiments/get?experiment_id=7")
        .header("host", "gateway.internal")
        .body(Body::empty())
        .expect("request");

    let response = proxy.forward("req-02", request).await;
    let payload = response_json(response).await;
    // reqwest sets its own host header for the upstream connection.
    assert_ne!(payload["host"], "gateway.internal");
    assert_eq!(payload["uri"], "/api/2.0/mlflow/experiments/get?experiment_id=7");
    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn oversized_body_is_rejected_before_upstream() {
    let proxy = proxy_with_base("http://127.0.0.1:9".to_string(), 8);
    let request = Request::builder()
        .method("POST")
        .uri("/api/2.0/mlflow/runs/log-batch")
        .body(Body::from("0123456789abcdef"))
        .expect("request");

    let response = proxy.forward("req-03", request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let payload = response_json(response).await;
    assert_eq!(payload["error_code"], "INVALID_PARAMETER_VALUE");
}

#[tokio::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    let proxy = proxy_with_base("http://127.0.0.1:9".to_string(), 1_024);
    let request = Request::builder()
        .method("GET")
        .uri("/api/2.0/mlflow/experiments/get")
        .body(Body::empty())
        .expect("request");

    let response = proxy.forward("req-04", request).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = response_json(response).await;
    assert_eq!(payload["error_code"], "INTERNAL_ERROR");
}

// ============================================================================
// SECTION: Header Filter Tests
// ============================================================================

#[test]
fn filter_strips_hop_by_hop_and_framing_headers() {
    let mut headers = HeaderMap::new();
    headers.insert("connection", HeaderValue::from_static("keep-alive"));
    headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
    headers.insert("content-length", HeaderValue::from_static("12"));
    headers.insert("proxy-authorization", HeaderValue::from_static("Basic x"));
    headers.insert("x-custom", HeaderValue::from_static("kept"));
    headers.insert("cookie", HeaderValue::from_static("mlflow.k8s.bearerToken=t"));

    let filtered = filter_headers(&headers);
    assert!(filtered.get("connection").is_none());
    assert!(filtered.get("transfer-encoding").is_none());
    assert!(filtered.get("content-length").is_none());
    assert!(filtered.get("proxy-authorization").is_none());
    assert_eq!(filtered.get("x-custom").map(HeaderValue::as_bytes), Some(b"kept".as_slice()));
    assert!(filtered.get("cookie").is_some());
}

#[test]
fn filter_preserves_repeated_headers() {
    let mut headers = HeaderMap::new();
    headers.append("set-cookie", HeaderValue::from_static("a=1"));
    headers.append("set-cookie", HeaderValue::from_static("b=2"));

    let filtered = filter_headers(&headers);
    assert_eq!(filtered.get_all("set-cookie").iter().count(), 2);
}
