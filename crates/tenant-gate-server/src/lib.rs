// crates/tenant-gate-server/src/lib.rs
// ============================================================================
// Module: Tenant Gate Server Library
// Description: HTTP authorization gateway for a shared tracking service.
// Purpose: Authorize tenant-scoped requests and proxy them upstream.
// Dependencies: tenant-gate-core, tenant-gate-config, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! Tenant Gate server fronts a shared MLflow-compatible tracking service and
//! decides, per request, whether the caller may act on the tenant named in
//! the tenant header. Decisions are delegated to an access-review authority
//! (Kubernetes `SelfSubjectAccessReview` in production) and enforced before
//! any request reaches the upstream service. The gateway fails closed:
//! missing credentials, authority denials, and authority outages all stop the
//! request at this layer.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod access_review;
pub mod audit;
pub mod auth;
pub mod correlation;
pub mod discovery;
pub mod gateway;
pub mod proxy;
pub mod server;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access_review::AccessDecision;
pub use access_review::AccessReviewError;
pub use access_review::AccessReviewer;
pub use access_review::KubernetesAccessReviewer;
pub use access_review::StaticAccessReviewer;
pub use audit::FileAuditSink;
pub use audit::GatewayAuditEvent;
pub use audit::GatewayAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use auth::BearerCredential;
pub use correlation::RequestId;
pub use correlation::RequestIdGenerator;
pub use gateway::AuthorizationGateway;
pub use gateway::DISCOVERY_PATH;
pub use server::GatewayServerError;
pub use server::ServerState;
pub use server::TenantGateServer;
pub use server::build_router;
pub use telemetry::GATEWAY_LATENCY_BUCKETS_MS;
pub use telemetry::GatewayMetricEvent;
pub use telemetry::GatewayMetrics;
pub use telemetry::GatewayOutcome;
pub use telemetry::NoopMetrics;
