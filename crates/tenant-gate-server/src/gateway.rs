// crates/tenant-gate-server/src/gateway.rs
// ============================================================================
// Module: Authorization Gateway
// Description: Per-request authorization pipeline and axum middleware.
// Purpose: Decide every request exactly once before it reaches upstream.
// Dependencies: tenant-gate-core, tenant-gate-config, axum
// ============================================================================

//! ## Overview
//! The gateway is the single decision point for tenant-scoped requests. Each
//! request runs a fixed pipeline: exempt-path check, tenant header
//! extraction, tenant grammar validation, classification into a
//! `(resource, verb)` tuple, credential extraction, and a delegated access
//! review. The first failing step rejects the request with the tracking
//! service's JSON error shape; nothing shorter than an explicit allow reaches
//! the upstream proxy. Every non-exempt evaluation emits exactly one audit
//! event and one metric sample.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use tenant_gate_config::GatewayConfig;
use tenant_gate_core::RequestClass;
use tenant_gate_core::TenantContext;
use tenant_gate_core::TenantName;
use tenant_gate_core::TenantNameError;
use tenant_gate_core::classify;

use crate::access_review::AccessDecision;
use crate::access_review::AccessReviewError;
use crate::access_review::AccessReviewer;
use crate::audit::GatewayAuditEvent;
use crate::audit::GatewayAuditEventParams;
use crate::audit::GatewayAuditSink;
use crate::auth::BearerCredential;
use crate::auth::acting_user;
use crate::auth::extract_credential;
use crate::correlation::REQUEST_ID_HEADER;
use crate::correlation::RequestId;
use crate::correlation::RequestIdGenerator;
use crate::correlation::sanitize_request_id;
use crate::server::ServerState;
use crate::telemetry::GatewayMetricEvent;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::GatewayOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Tenant discovery route path.
pub const DISCOVERY_PATH: &str = "/ajax-api/2.0/mlflow/namespaces";

/// Paths exempt from authorization, matched exactly.
const EXEMPT_EXACT: [&str; 5] = ["/", "/health", "/version", "/favicon.ico", DISCOVERY_PATH];

/// Path prefixes exempt from authorization.
const EXEMPT_PREFIXES: [&str; 4] = ["/static/", "/static-files/", "/js/", "/.well-known/"];

/// Outward error code for malformed requests.
pub(crate) const INVALID_PARAMETER_CODE: &str = "INVALID_PARAMETER_VALUE";

/// Outward error code for authentication failures.
pub(crate) const UNAUTHENTICATED_CODE: &str = "UNAUTHENTICATED";

/// Outward error code for authorization failures.
pub(crate) const PERMISSION_DENIED_CODE: &str = "PERMISSION_DENIED";

/// Outward message for tenant names that fail validation.
const INVALID_TENANT_MESSAGE: &str =
    "Invalid tenant name. Must follow Kubernetes naming conventions.";

// ============================================================================
// SECTION: Exempt Paths
// ============================================================================

/// Exempt path matcher combining built-in routes with configured extras.
#[derive(Debug, Clone)]
pub struct ExemptPaths {
    /// Extra exempt path prefixes from configuration.
    extra_prefixes: Vec<String>,
}

impl ExemptPaths {
    /// Creates a matcher with the given extra prefixes.
    #[must_use]
    pub const fn new(extra_prefixes: Vec<String>) -> Self {
        Self {
            extra_prefixes,
        }
    }

    /// Returns whether the path bypasses authorization.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if EXEMPT_EXACT.contains(&path) {
            return true;
        }
        if EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }
        self.extra_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

// ============================================================================
// SECTION: Evaluation Types
// ============================================================================

/// Borrowed view of one request for gateway evaluation.
#[derive(Debug)]
pub struct GatewayRequest<'a> {
    /// HTTP method name.
    pub method: &'a str,
    /// URL path.
    pub path: &'a str,
    /// Request headers.
    pub headers: &'a HeaderMap,
    /// Peer address, when known.
    pub peer: Option<IpAddr>,
}

/// Terminal rejection produced by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRejection {
    /// HTTP status for the outward response.
    pub status: StatusCode,
    /// Stable outward error code.
    pub error_code: &'static str,
    /// Outward human-readable message.
    pub message: String,
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayVerdict {
    /// The path bypasses authorization.
    Exempt,
    /// The request may proceed upstream under the given context.
    Allowed {
        /// Authenticated tenant context for the request.
        context: TenantContext,
        /// Authorization tuple the request was checked against.
        class: RequestClass,
    },
    /// The request is rejected before reaching upstream.
    Rejected(GatewayRejection),
}

/// Full evaluation result, including the metric sample for latency recording.
#[derive(Debug)]
pub struct GatewayEvaluation {
    /// Correlation identifier assigned to the request.
    pub request_id: String,
    /// Decision for the request.
    pub verdict: GatewayVerdict,
    /// Metric sample describing the evaluation.
    pub metric_event: GatewayMetricEvent,
}

/// Inputs for one gateway rejection.
struct RejectionParams<'a> {
    /// HTTP status for the outward response.
    status: StatusCode,
    /// Stable outward error code.
    error_code: &'static str,
    /// Outward human-readable message.
    message: String,
    /// Metric and audit outcome.
    outcome: GatewayOutcome,
    /// Stable audit error kind.
    error_kind: &'static str,
    /// Audit-only detail beyond the outward message.
    reason: Option<String>,
    /// Tenant, when already parsed.
    tenant: Option<&'a TenantName>,
    /// Authorization tuple, when already classified.
    class: Option<RequestClass>,
    /// Credential, when already extracted.
    credential: Option<&'a BearerCredential>,
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Request authorization gateway.
///
/// # Invariants
/// - Authorization is decided exactly once per request, before any upstream
///   call.
/// - Authority outages reject the request; they never fall through to allow.
pub struct AuthorizationGateway {
    /// Delegated access-review authority.
    reviewer: Arc<dyn AccessReviewer>,
    /// Audit sink receiving one event per non-exempt evaluation.
    audit: Arc<dyn GatewayAuditSink>,
    /// Metric sink receiving request counts and latencies.
    metrics: Arc<dyn GatewayMetrics>,
    /// Exempt path matcher.
    exempt: ExemptPaths,
    /// Tenant header name, lower-cased.
    tenant_header: String,
    /// Correlation identifier generator.
    request_ids: RequestIdGenerator,
}

impl AuthorizationGateway {
    /// Creates a gateway over the given authority and sinks.
    #[must_use]
    pub fn new(
        reviewer: Arc<dyn AccessReviewer>,
        audit: Arc<dyn GatewayAuditSink>,
        metrics: Arc<dyn GatewayMetrics>,
        gateway: &GatewayConfig,
    ) -> Self {
        Self {
            reviewer,
            audit,
            metrics,
            exempt: ExemptPaths::new(gateway.extra_exempt_paths.clone()),
            tenant_header: gateway.tenant_header.to_ascii_lowercase(),
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Evaluates one request through the authorization pipeline.
    pub async fn evaluate_request(&self, request: &GatewayRequest<'_>) -> GatewayEvaluation {
        let request_id = self.resolve_request_id(request.headers);

        if self.exempt.matches(request.path) {
            let metric_event = GatewayMetricEvent {
                resource: None,
                verb: None,
                outcome: GatewayOutcome::Exempt,
                status: None,
                tenant: None,
            };
            self.metrics.record_request(metric_event.clone());
            return GatewayEvaluation {
                request_id,
                verdict: GatewayVerdict::Exempt,
                metric_event,
            };
        }

        let Some(header_value) = request.headers.get(self.tenant_header.as_str()) else {
            return self.reject(request, request_id, RejectionParams {
                status: StatusCode::BAD_REQUEST,
                error_code: INVALID_PARAMETER_CODE,
                message: format!("Missing {} header.", self.tenant_header),
                outcome: GatewayOutcome::InvalidRequest,
                error_kind: "missing_tenant_header",
                reason: None,
                tenant: None,
                class: None,
                credential: None,
            });
        };

        let parsed = header_value
            .to_str()
            .map_err(|_| TenantNameError::BadSyntax)
            .and_then(|raw| TenantName::parse(raw.trim()));
        let tenant = match parsed {
            Ok(tenant) => tenant,
            Err(err) => {
                return self.reject(request, request_id, RejectionParams {
                    status: StatusCode::BAD_REQUEST,
                    error_code: INVALID_PARAMETER_CODE,
                    message: INVALID_TENANT_MESSAGE.to_string(),
                    outcome: GatewayOutcome::InvalidRequest,
                    error_kind: err.label(),
                    reason: None,
                    tenant: None,
                    class: None,
                    credential: None,
                });
            }
        };

        let class = classify(request.method, request.path);
        let credential = extract_credential(request.headers);
        let user = if wants_acting_user(request.method, request.path) {
            acting_user(request.headers)
        } else {
            None
        };

        match self
            .reviewer
            .authorize(credential.as_ref(), &tenant, class.resource, class.verb)
            .await
        {
            Ok(AccessDecision::Allowed) => {
                self.record_allowed(request, &request_id, &tenant, class, &credential, &user);
                let metric_event = GatewayMetricEvent {
                    resource: Some(class.resource),
                    verb: Some(class.verb),
                    outcome: GatewayOutcome::Allowed,
                    status: None,
                    tenant: Some(tenant.as_str().to_string()),
                };
                self.metrics.record_request(metric_event.clone());
                let mut context = TenantContext::new(tenant);
                if let Some(user) = user {
                    context = context.with_user(user);
                }
                GatewayEvaluation {
                    request_id,
                    verdict: GatewayVerdict::Allowed {
                        context,
                        class,
                    },
                    metric_event,
                }
            }
            Ok(AccessDecision::Denied {
                reason,
            }) => self.reject(request, request_id, RejectionParams {
                status: StatusCode::FORBIDDEN,
                error_code: PERMISSION_DENIED_CODE,
                message: format!("access denied by review: {reason}"),
                outcome: GatewayOutcome::Denied,
                error_kind: "review_denied",
                reason: Some(reason),
                tenant: Some(&tenant),
                class: Some(class),
                credential: credential.as_ref(),
            }),
            Err(AccessReviewError::Unauthenticated(reason)) => {
                self.reject(request, request_id, RejectionParams {
                    status: StatusCode::UNAUTHORIZED,
                    error_code: UNAUTHENTICATED_CODE,
                    message: reason.clone(),
                    outcome: GatewayOutcome::Unauthenticated,
                    error_kind: "unauthenticated",
                    reason: Some(reason),
                    tenant: Some(&tenant),
                    class: Some(class),
                    credential: credential.as_ref(),
                })
            }
            Err(AccessReviewError::Unavailable(cause)) => {
                self.reject(request, request_id, RejectionParams {
                    status: StatusCode::FORBIDDEN,
                    error_code: PERMISSION_DENIED_CODE,
                    message: format!("access denied for tenant '{tenant}'"),
                    outcome: GatewayOutcome::Unavailable,
                    error_kind: "authority_unavailable",
                    reason: Some(cause),
                    tenant: Some(&tenant),
                    class: Some(class),
                    credential: credential.as_ref(),
                })
            }
        }
    }

    /// Records the latency sample for one completed request.
    pub fn observe_latency(&self, event: GatewayMetricEvent, latency: Duration) {
        self.metrics.record_latency(event, latency);
    }

    /// Resolves the request correlation identifier, generating one when the
    /// supplied value is absent or rejected.
    fn resolve_request_id(&self, headers: &HeaderMap) -> String {
        let supplied = headers.get(REQUEST_ID_HEADER).and_then(|value| value.to_str().ok());
        match sanitize_request_id(supplied) {
            Ok(Some(id)) => id,
            Ok(None) | Err(_) => self.request_ids.issue(),
        }
    }

    /// Emits the audit event for an allowed request.
    fn record_allowed(
        &self,
        request: &GatewayRequest<'_>,
        request_id: &str,
        tenant: &TenantName,
        class: RequestClass,
        credential: &Option<BearerCredential>,
        user: &Option<String>,
    ) {
        self.audit.record(&GatewayAuditEvent::new(GatewayAuditEventParams {
            request_id: request_id.to_string(),
            peer_ip: request.peer.map(|ip| ip.to_string()),
            method: request.method.to_string(),
            path: request.path.to_string(),
            tenant: Some(tenant.as_str().to_string()),
            resource: Some(class.resource),
            verb: Some(class.verb),
            outcome: GatewayOutcome::Allowed,
            error_kind: None,
            reason: None,
            acting_user: user.clone(),
            token_fingerprint: credential.as_ref().map(BearerCredential::fingerprint),
        }));
    }

    /// Emits the audit event and metric sample for a rejection.
    fn reject(
        &self,
        request: &GatewayRequest<'_>,
        request_id: String,
        params: RejectionParams<'_>,
    ) -> GatewayEvaluation {
        let metric_event = GatewayMetricEvent {
            resource: params.class.map(|class| class.resource),
            verb: params.class.map(|class| class.verb),
            outcome: params.outcome,
            status: Some(params.status.as_u16()),
            tenant: params.tenant.map(|tenant| tenant.as_str().to_string()),
        };
        self.audit.record(&GatewayAuditEvent::new(GatewayAuditEventParams {
            request_id: request_id.clone(),
            peer_ip: request.peer.map(|ip| ip.to_string()),
            method: request.method.to_string(),
            path: request.path.to_string(),
            tenant: params.tenant.map(|tenant| tenant.as_str().to_string()),
            resource: params.class.map(|class| class.resource),
            verb: params.class.map(|class| class.verb),
            outcome: params.outcome,
            error_kind: Some(params.error_kind),
            reason: params.reason,
            acting_user: None,
            token_fingerprint: params.credential.map(BearerCredential::fingerprint),
        }));
        self.metrics.record_request(metric_event.clone());
        GatewayEvaluation {
            request_id,
            verdict: GatewayVerdict::Rejected(GatewayRejection {
                status: params.status,
                error_code: params.error_code,
                message: params.message,
            }),
            metric_event,
        }
    }
}

/// Returns whether the route resolves an advisory acting user.
fn wants_acting_user(method: &str, path: &str) -> bool {
    if !method.eq_ignore_ascii_case("POST") {
        return false;
    }
    let lower = path.to_ascii_lowercase();
    lower.contains("/runs/create") || lower.contains("/runs/log-batch")
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Builds a JSON error response in the tracking service's error shape.
#[must_use]
pub fn error_response(status: StatusCode, error_code: &str, message: &str) -> Response {
    let payload = serde_json::json!({
        "error_code": error_code,
        "message": message,
    });
    (status, Json(payload)).into_response()
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Axum middleware running the gateway pipeline ahead of every route.
///
/// Allowed requests proceed with the assigned [`RequestId`] and
/// [`TenantContext`] attached to request extensions; rejected requests are
/// answered here and never reach the inner service.
pub async fn authorize_middleware(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let evaluation = {
        let view = GatewayRequest {
            method: &method,
            path: &path,
            headers: request.headers(),
            peer: Some(peer.ip()),
        };
        state.gateway.evaluate_request(&view).await
    };

    let mut metric_event = evaluation.metric_event;
    match evaluation.verdict {
        GatewayVerdict::Exempt => {
            request.extensions_mut().insert(RequestId(evaluation.request_id));
            let response = next.run(request).await;
            metric_event.status = Some(response.status().as_u16());
            state.gateway.observe_latency(metric_event, started.elapsed());
            response
        }
        GatewayVerdict::Allowed {
            context, ..
        } => {
            request.extensions_mut().insert(RequestId(evaluation.request_id));
            request.extensions_mut().insert(context);
            let response = next.run(request).await;
            metric_event.status = Some(response.status().as_u16());
            state.gateway.observe_latency(metric_event, started.elapsed());
            response
        }
        GatewayVerdict::Rejected(rejection) => {
            let response =
                error_response(rejection.status, rejection.error_code, &rejection.message);
            state.gateway.observe_latency(metric_event, started.elapsed());
            response
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
