// crates/tenant-gate-server/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for gateway integration tests.
// Purpose: Spawn a live gateway with recording sinks and an echo upstream.
// Dependencies: tenant-gate-config, tenant-gate-core, tenant-gate-server, axum
// ============================================================================

//! ## Overview
//! This module provides the live-server harness used across the gateway
//! integration tests: an echo upstream that reports what it received, a
//! gateway bound to an ephemeral port, and recording audit and metric sinks
//! so tests can assert exactly what each request produced.
//!
//! Security posture: fixtures default to deny; tests grant access explicitly
//! per token so authorization gaps surface as failures.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Request;
use serde_json::Value;
use serde_json::json;
use tenant_gate_config::TenantGateConfig;
use tenant_gate_core::TenantName;
use tenant_gate_server::AccessReviewer;
use tenant_gate_server::GatewayAuditEvent;
use tenant_gate_server::GatewayAuditSink;
use tenant_gate_server::GatewayMetricEvent;
use tenant_gate_server::GatewayMetrics;
use tenant_gate_server::ServerState;
use tenant_gate_server::build_router;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Recording Sinks
// ============================================================================

/// Audit sink that captures every recorded event.
#[derive(Default)]
pub struct RecordingAudit {
    /// Events in record order.
    pub events: Mutex<Vec<GatewayAuditEvent>>,
}

impl GatewayAuditSink for RecordingAudit {
    fn record(&self, event: &GatewayAuditEvent) {
        self.events.lock().expect("audit lock").push(event.clone());
    }
}

/// Metrics sink that captures request events and latency samples.
#[derive(Default)]
pub struct RecordingMetrics {
    /// Request events in record order.
    pub requests: Mutex<Vec<GatewayMetricEvent>>,
    /// Latency samples in record order.
    pub latencies: Mutex<Vec<Duration>>,
}

impl GatewayMetrics for RecordingMetrics {
    fn record_request(&self, event: GatewayMetricEvent) {
        self.requests.lock().expect("metrics lock").push(event);
    }

    fn record_latency(&self, _event: GatewayMetricEvent, latency: Duration) {
        self.latencies.lock().expect("metrics lock").push(latency);
    }
}

// ============================================================================
// SECTION: Echo Upstream
// ============================================================================

async fn echo_handler(request: Request) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let request_id = parts
        .headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let tenant_header = parts
        .headers
        .get("x-mlflow-namespace")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    Json(json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "request_id": request_id,
        "tenant_header": tenant_header,
        "body": String::from_utf8_lossy(&bytes),
    }))
}

/// Spawns an upstream that echoes request details back as JSON.
pub async fn spawn_echo_upstream() -> (String, oneshot::Sender<()>) {
    let app = Router::new().fallback(echo_handler);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
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

// ============================================================================
// SECTION: Gateway Harness
// ============================================================================

/// A live gateway with its upstream and recording sinks.
pub struct GatewayHarness {
    /// Base URL of the gateway listener.
    pub base_url: String,
    /// Base URL of the echo upstream.
    pub upstream_url: String,
    /// Audit events recorded by the gateway.
    pub audit: Arc<RecordingAudit>,
    /// Metric events recorded by the gateway.
    pub metrics: Arc<RecordingMetrics>,
    gateway_shutdown: oneshot::Sender<()>,
    upstream_shutdown: oneshot::Sender<()>,
}

impl GatewayHarness {
    /// Snapshot of recorded audit events.
    #[must_use]
    pub fn audit_events(&self) -> Vec<GatewayAuditEvent> {
        self.audit.events.lock().expect("audit lock").clone()
    }

    /// Snapshot of recorded request metric events.
    #[must_use]
    pub fn request_events(&self) -> Vec<GatewayMetricEvent> {
        self.metrics.requests.lock().expect("metrics lock").clone()
    }

    /// Stops the gateway and its upstream.
    pub fn stop(self) {
        let _ = self.gateway_shutdown.send(());
        let _ = self.upstream_shutdown.send(());
    }
}

/// Spawns a gateway on an ephemeral port with an echo upstream behind it.
pub async fn spawn_gateway(
    reviewer: Arc<dyn AccessReviewer>,
    mut config: TenantGateConfig,
) -> GatewayHarness {
    let (upstream_url, upstream_shutdown) = spawn_echo_upstream().await;
    config.upstream.base_url.clone_from(&upstream_url);

    let audit = Arc::new(RecordingAudit::default());
    let metrics = Arc::new(RecordingMetrics::default());
    let state = ServerState::new(
        &config,
        reviewer,
        Arc::clone(&audit) as Arc<dyn GatewayAuditSink>,
        Arc::clone(&metrics) as Arc<dyn GatewayMetrics>,
    )
    .expect("server state");
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
    let addr = listener.local_addr().expect("gateway addr");
    let (gateway_shutdown, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    GatewayHarness {
        base_url: format!("http://{}", addr),
        upstream_url,
        audit,
        metrics,
        gateway_shutdown,
        upstream_shutdown,
    }
}

/// Parses a tenant name fixture.
#[must_use]
pub fn tenant(name: &str) -> TenantName {
    TenantName::parse(name).expect("valid tenant")
}
