// crates/tenant-gate-server/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Observability hooks for gateway request evaluation.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: tenant-gate-core
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for gateway request counters
//! and latency histograms. It is intentionally dependency-light so
//! deployments can plug in Prometheus or OpenTelemetry without redesign.
//! Labels must stay bounded: tenant names are caller-controlled and belong
//! in audit events, not metric labels, so the event carries them separately
//! for sinks that choose to aggregate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use tenant_gate_core::ApiResource;
use tenant_gate_core::ApiVerb;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for gateway request histograms.
pub const GATEWAY_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Gateway evaluation outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    /// Request authorized and forwarded.
    Allowed,
    /// Request rejected before authorization (missing/invalid tenant).
    InvalidRequest,
    /// Credential missing or rejected by the authority.
    Unauthenticated,
    /// Authority denied the request.
    Denied,
    /// Authority unreachable; request denied fail-closed.
    Unavailable,
    /// Path exempt from tenant authorization.
    Exempt,
}

impl GatewayOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::InvalidRequest => "invalid_request",
            Self::Unauthenticated => "unauthenticated",
            Self::Denied => "denied",
            Self::Unavailable => "unavailable",
            Self::Exempt => "exempt",
        }
    }
}

/// Gateway request metric event payload.
///
/// # Invariants
/// - Optional fields are `None` when the metadata is unavailable.
#[derive(Debug, Clone)]
pub struct GatewayMetricEvent {
    /// Resource family the request classified into.
    pub resource: Option<ApiResource>,
    /// Verb the request classified into.
    pub verb: Option<ApiVerb>,
    /// Evaluation outcome.
    pub outcome: GatewayOutcome,
    /// HTTP status produced by the gateway decision, when rejected.
    pub status: Option<u16>,
    /// Tenant named by the request, when valid.
    pub tenant: Option<String>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gateway evaluations and latencies.
pub trait GatewayMetrics: Send + Sync {
    /// Records an evaluation counter event.
    fn record_request(&self, event: GatewayMetricEvent);
    /// Records a latency observation for the completed request.
    fn record_latency(&self, event: GatewayMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_request(&self, _event: GatewayMetricEvent) {}

    fn record_latency(&self, _event: GatewayMetricEvent, _latency: Duration) {}
}
