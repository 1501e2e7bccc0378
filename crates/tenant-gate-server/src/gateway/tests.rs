// crates/tenant-gate-server/src/gateway/tests.rs
// ============================================================================
// Module: Authorization Gateway Tests
// Description: Unit tests for the per-request authorization pipeline.
// Purpose: Validate exempt handling, rejection mapping, and audit emission.
// Dependencies: tenant-gate-server, axum
// ============================================================================

//! ## Overview
//! Drives the gateway pipeline directly with borrowed request views and
//! recording sinks, asserting the verdicts, outward error shapes, and the
//! one-audit-event-per-evaluation contract.

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

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use tenant_gate_config::GatewayConfig;
use tenant_gate_core::ApiResource;
use tenant_gate_core::ApiVerb;
use tenant_gate_core::TenantName;

use super::AuthorizationGateway;
use super::DISCOVERY_PATH;
use super::ExemptPaths;
use super::GatewayRequest;
use super::GatewayVerdict;
use crate::access_review::AccessDecision;
use crate::access_review::AccessReviewError;
use crate::access_review::AccessReviewer;
use crate::access_review::StaticAccessReviewer;
use crate::audit::GatewayAuditEvent;
use crate::audit::GatewayAuditSink;
use crate::auth::BearerCredential;
use crate::telemetry::GatewayMetricEvent;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::GatewayOutcome;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingAudit {
    events: Mutex<Vec<GatewayAuditEvent>>,
}

impl GatewayAuditSink for RecordingAudit {
    fn record(&self, event: &GatewayAuditEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}

#[derive(Default)]
struct RecordingMetrics {
    requests: Mutex<Vec<GatewayMetricEvent>>,
    latencies: Mutex<Vec<Duration>>,
}

impl GatewayMetrics for RecordingMetrics {
    fn record_request(&self, event: GatewayMetricEvent) {
        self.requests.lock().expect("requests lock").push(event);
    }

    fn record_latency(&self, _event: GatewayMetricEvent, latency: Duration) {
        self.latencies.lock().expect("latencies lock").push(latency);
    }
}

fn gateway_with(
    reviewer: Arc<dyn AccessReviewer>,
) -> (AuthorizationGateway, Arc<RecordingAudit>, Arc<RecordingMetrics>) {
    let audit = Arc::new(RecordingAudit::default());
    let metrics = Arc::new(RecordingMetrics::default());
    let gateway = AuthorizationGateway::new(
        reviewer,
        Arc::clone(&audit) as Arc<dyn GatewayAuditSink>,
        Arc::clone(&metrics) as Arc<dyn GatewayMetrics>,
        &GatewayConfig::default(),
    );
    (gateway, audit, metrics)
}

fn headers_from(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.append(
            HeaderName::try_from(*name).expect("valid header name"),
            HeaderValue::from_str(value).expect("valid header value"),
        );
    }
    headers
}

fn view<'a>(method: &'a str, path: &'a str, headers: &'a HeaderMap) -> GatewayRequest<'a> {
    GatewayRequest {
        method,
        path,
        headers,
        peer: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
    }
}

fn tenant(name: &str) -> TenantName {
    TenantName::parse(name).expect("valid tenant")
}

// ============================================================================
// SECTION: Exempt Path Tests
// ============================================================================

#[test]
fn exempt_paths_match_expected_routes() {
    let exempt = ExemptPaths::new(vec!["/metrics".to_string()]);

    for path in [
        "/",
        "/health",
        "/version",
        "/favicon.ico",
        DISCOVERY_PATH,
        "/static/app.js",
        "/static-files/index.html",
        "/js/vendor.js",
        "/.well-known/health",
        "/metrics",
        "/metrics/requests",
    ] {
        assert!(exempt.matches(path), "expected exemption for {path}");
    }

    for path in [
        "/api/2.0/mlflow/experiments/create",
        "/healthz",
        "/staticx",
        "/ajax-api/2.0/mlflow/runs/create",
    ] {
        assert!(!exempt.matches(path), "expected authorization for {path}");
    }
}

#[tokio::test]
async fn exempt_request_records_metric_without_audit() {
    let (gateway, audit, metrics) = gateway_with(Arc::new(StaticAccessReviewer::new(vec![])));
    let headers = HeaderMap::new();

    let evaluation = gateway.evaluate_request(&view("GET", "/health", &headers)).await;

    assert_eq!(evaluation.verdict, GatewayVerdict::Exempt);
    assert!(audit.events.lock().expect("events lock").is_empty());
    let requests = metrics.requests.lock().expect("requests lock");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].outcome, GatewayOutcome::Exempt);
}

// ============================================================================
// SECTION: Rejection Tests
// ============================================================================

#[tokio::test]
async fn missing_tenant_header_is_invalid_request() {
    let (gateway, audit, metrics) = gateway_with(Arc::new(StaticAccessReviewer::new(vec![])));
    let headers = HeaderMap::new();

    let evaluation =
        gateway.evaluate_request(&view("GET", "/api/2.0/mlflow/experiments/get", &headers)).await;

    let GatewayVerdict::Rejected(rejection) = evaluation.verdict else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejection.error_code, "INVALID_PARAMETER_VALUE");
    assert_eq!(rejection.message, "Missing x-mlflow-namespace header.");

    let events = audit.events.lock().expect("events lock");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, GatewayOutcome::InvalidRequest);
    assert_eq!(events[0].error_kind, Some("missing_tenant_header"));
    assert!(events[0].tenant.is_none());
    let requests = metrics.requests.lock().expect("requests lock");
    assert_eq!(requests[0].status, Some(400));
}

#[tokio::test]
async fn invalid_tenant_name_is_invalid_request() {
    let (gateway, audit, _metrics) = gateway_with(Arc::new(StaticAccessReviewer::new(vec![])));
    let headers = headers_from(&[("x-mlflow-namespace", "Team_A!")]);

    let evaluation =
        gateway.evaluate_request(&view("GET", "/api/2.0/mlflow/experiments/get", &headers)).await;

    let GatewayVerdict::Rejected(rejection) = evaluation.verdict else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        rejection.message,
        "Invalid tenant name. Must follow Kubernetes naming conventions."
    );
    let events = audit.events.lock().expect("events lock");
    assert_eq!(events[0].error_kind, Some("bad_syntax"));
}

#[tokio::test]
async fn undecodable_tenant_header_is_invalid_request() {
    let (gateway, _audit, _metrics) = gateway_with(Arc::new(StaticAccessReviewer::new(vec![])));
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-mlflow-namespace"),
        HeaderValue::from_bytes(b"team-\xff").expect("opaque header value"),
    );

    let evaluation =
        gateway.evaluate_request(&view("GET", "/api/2.0/mlflow/experiments/get", &headers)).await;

    let GatewayVerdict::Rejected(rejection) = evaluation.verdict else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejection.error_code, "INVALID_PARAMETER_VALUE");
}

#[tokio::test]
async fn denied_review_maps_to_permission_denied() {
    let mut reviewer = StaticAccessReviewer::new(vec![]);
    reviewer.grant("token-a", tenant("team-a"), ApiResource::Experiments, ApiVerb::Get);
    let (gateway, audit, _metrics) = gateway_with(Arc::new(reviewer));
    let headers = headers_from(&[
        ("x-mlflow-namespace", "team-b"),
        ("authorization", "Bearer token-a"),
    ]);

    let evaluation =
        gateway.evaluate_request(&view("GET", "/api/2.0/mlflow/experiments/get", &headers)).await;

    let GatewayVerdict::Rejected(rejection) = evaluation.verdict else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.status, StatusCode::FORBIDDEN);
    assert_eq!(rejection.error_code, "PERMISSION_DENIED");
    assert!(rejection.message.starts_with("access denied by review: "));
    let events = audit.events.lock().expect("events lock");
    assert_eq!(events[0].error_kind, Some("review_denied"));
    assert_eq!(events[0].tenant.as_deref(), Some("team-b"));
}

#[tokio::test]
async fn missing_credential_maps_to_unauthenticated() {
    let (gateway, audit, _metrics) = gateway_with(Arc::new(StaticAccessReviewer::new(vec![])));
    let headers = headers_from(&[("x-mlflow-namespace", "team-a")]);

    let evaluation =
        gateway.evaluate_request(&view("GET", "/api/2.0/mlflow/experiments/get", &headers)).await;

    let GatewayVerdict::Rejected(rejection) = evaluation.verdict else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
    assert_eq!(rejection.error_code, "UNAUTHENTICATED");
    assert_eq!(rejection.message, "missing bearer token");
    let events = audit.events.lock().expect("events lock");
    assert_eq!(events[0].outcome, GatewayOutcome::Unauthenticated);
    assert!(events[0].token_fingerprint.is_none());
}

#[tokio::test]
async fn authority_outage_fails_closed() {
    struct OutageReviewer;

    #[async_trait::async_trait]
    impl AccessReviewer for OutageReviewer {
        async fn authorize(
            &self,
            _credential: Option<&BearerCredential>,
            _tenant: &TenantName,
            _resource: ApiResource,
            _verb: ApiVerb,
        ) -> Result<AccessDecision, AccessReviewError> {
            Err(AccessReviewError::Unavailable("authority timeout".to_string()))
        }

        async fn list_all_tenants(&self) -> Vec<TenantName> {
            Vec::new()
        }
    }

    let (gateway, audit, metrics) = gateway_with(Arc::new(OutageReviewer));
    let headers = headers_from(&[
        ("x-mlflow-namespace", "team-a"),
        ("authorization", "Bearer token-a"),
    ]);

    let evaluation =
        gateway.evaluate_request(&view("GET", "/api/2.0/mlflow/experiments/get", &headers)).await;

    let GatewayVerdict::Rejected(rejection) = evaluation.verdict else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.status, StatusCode::FORBIDDEN);
    assert_eq!(rejection.error_code, "PERMISSION_DENIED");
    assert_eq!(rejection.message, "access denied for tenant 'team-a'");

    let events = audit.events.lock().expect("events lock");
    assert_eq!(events[0].outcome, GatewayOutcome::Unavailable);
    assert_eq!(events[0].error_kind, Some("authority_unavailable"));
    assert_eq!(events[0].reason.as_deref(), Some("authority timeout"));
    let requests = metrics.requests.lock().expect("requests lock");
    assert_eq!(requests[0].outcome, GatewayOutcome::Unavailable);
}

// ============================================================================
// SECTION: Allow Tests
// ============================================================================

#[tokio::test]
async fn allowed_request_attaches_context_and_audits() {
    let mut reviewer = StaticAccessReviewer::new(vec![]);
    reviewer.grant("token-a", tenant("team-a"), ApiResource::Experiments, ApiVerb::Get);
    let (gateway, audit, metrics) = gateway_with(Arc::new(reviewer));
    let headers = headers_from(&[
        ("x-mlflow-namespace", "team-a"),
        ("authorization", "Bearer token-a"),
    ]);

    let evaluation =
        gateway.evaluate_request(&view("GET", "/api/2.0/mlflow/experiments/get", &headers)).await;

    let GatewayVerdict::Allowed {
        context,
        class,
    } = evaluation.verdict
    else {
        panic!("expected allow");
    };
    assert_eq!(context.tenant.as_str(), "team-a");
    assert_eq!(context.user, None);
    assert_eq!(class.resource, ApiResource::Experiments);
    assert_eq!(class.verb, ApiVerb::Get);

    let events = audit.events.lock().expect("events lock");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, GatewayOutcome::Allowed);
    let fingerprint = events[0].token_fingerprint.as_deref().expect("fingerprint");
    assert!(fingerprint.starts_with("sha256:"));
    let requests = metrics.requests.lock().expect("requests lock");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].outcome, GatewayOutcome::Allowed);
    assert_eq!(requests[0].status, None);
}

#[tokio::test]
async fn acting_user_resolved_only_for_run_mutation_routes() {
    let (gateway, _audit, _metrics) =
        gateway_with(Arc::new(StaticAccessReviewer::allow_all(vec![])));
    let headers = headers_from(&[
        ("x-mlflow-namespace", "team-a"),
        ("authorization", "Bearer token-a"),
        ("x-forwarded-user", "alice@example.com"),
    ]);

    for (method, path, expected_user) in [
        ("POST", "/api/2.0/mlflow/runs/create", Some("alice@example.com")),
        ("POST", "/api/2.0/mlflow/runs/log-batch", Some("alice@example.com")),
        ("GET", "/api/2.0/mlflow/experiments/get", None),
        ("POST", "/api/2.0/mlflow/experiments/create", None),
    ] {
        let evaluation = gateway.evaluate_request(&view(method, path, &headers)).await;
        let GatewayVerdict::Allowed {
            context, ..
        } = evaluation.verdict
        else {
            panic!("expected allow for {method} {path}");
        };
        assert_eq!(context.user.as_deref(), expected_user, "unexpected user for {method} {path}");
    }
}

// ============================================================================
// SECTION: Correlation Tests
// ============================================================================

#[tokio::test]
async fn request_id_supplied_or_generated() {
    let (gateway, _audit, _metrics) =
        gateway_with(Arc::new(StaticAccessReviewer::allow_all(vec![])));

    let headers = headers_from(&[("x-request-id", "req-42")]);
    let evaluation = gateway.evaluate_request(&view("GET", "/health", &headers)).await;
    assert_eq!(evaluation.request_id, "req-42");

    let long_id = "a".repeat(200);
    let headers = headers_from(&[("x-request-id", long_id.as_str())]);
    let evaluation = gateway.evaluate_request(&view("GET", "/health", &headers)).await;
    assert!(evaluation.request_id.starts_with("tg-"));
}
