// crates/tenant-gate-server/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for gateway authorization decisions.
// Purpose: Emit redacted audit logs without hard dependencies.
// Dependencies: tenant-gate-core, serde
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for gateway decision
//! logging. Every evaluated request produces exactly one event carrying the
//! decision, the classified resource/verb tuple, and a redacted credential
//! fingerprint. When the authority is unavailable the outward response stays
//! a generic denial while the event records the infrastructure cause, so
//! operators can separate outages from real permission problems.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tenant_gate_core::ApiResource;
use tenant_gate_core::ApiVerb;

use crate::telemetry::GatewayOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Gateway audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier assigned to the evaluation.
    pub request_id: String,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// HTTP method of the request.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Tenant named by the request, when valid.
    pub tenant: Option<String>,
    /// Resource family the request classified into.
    pub resource: Option<ApiResource>,
    /// Verb the request classified into.
    pub verb: Option<ApiVerb>,
    /// Evaluation outcome.
    pub outcome: GatewayOutcome,
    /// Normalized error kind label for rejections.
    pub error_kind: Option<&'static str>,
    /// Decision reason; records the infrastructure cause for outages.
    pub reason: Option<String>,
    /// Advisory acting user, when resolved.
    pub acting_user: Option<String>,
    /// Bearer token fingerprint (sha256, truncated).
    pub token_fingerprint: Option<String>,
}

/// Inputs required to construct a gateway audit event.
pub struct GatewayAuditEventParams {
    /// Request identifier assigned to the evaluation.
    pub request_id: String,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// HTTP method of the request.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Tenant named by the request, when valid.
    pub tenant: Option<String>,
    /// Resource family the request classified into.
    pub resource: Option<ApiResource>,
    /// Verb the request classified into.
    pub verb: Option<ApiVerb>,
    /// Evaluation outcome.
    pub outcome: GatewayOutcome,
    /// Normalized error kind label for rejections.
    pub error_kind: Option<&'static str>,
    /// Decision reason; records the infrastructure cause for outages.
    pub reason: Option<String>,
    /// Advisory acting user, when resolved.
    pub acting_user: Option<String>,
    /// Bearer token fingerprint (sha256, truncated).
    pub token_fingerprint: Option<String>,
}

impl GatewayAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: GatewayAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "gateway_request",
            timestamp_ms,
            request_id: params.request_id,
            peer_ip: params.peer_ip,
            method: params.method,
            path: params.path,
            tenant: params.tenant,
            resource: params.resource,
            verb: params.verb,
            outcome: params.outcome,
            error_kind: params.error_kind,
            reason: params.reason,
            acting_user: params.acting_user,
            token_fingerprint: params.token_fingerprint,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gateway decision events.
pub trait GatewayAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &GatewayAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GatewayAuditSink for StderrAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GatewayAuditSink for FileAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl GatewayAuditSink for NoopAuditSink {
    fn record(&self, _event: &GatewayAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
