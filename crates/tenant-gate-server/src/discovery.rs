// crates/tenant-gate-server/src/discovery.rs
// ============================================================================
// Module: Tenant Discovery
// Description: Endpoint listing the tenants a credential can access.
// Purpose: Let clients enumerate reachable tenants without probing by hand.
// Dependencies: tenant-gate-core, axum
// ============================================================================

//! ## Overview
//! Discovery answers "which tenants can this credential use?" by unioning
//! three candidate sources: service-identity enumeration, the caller's own
//! tenant header (when it parses), and the configured fallback list, the last
//! applied only when enumeration came back empty. The union is then filtered
//! through the access-review authority with the caller's credential, so the
//! response never names a tenant the caller cannot actually reach. An empty
//! result is a 403 rather than an empty 200, which keeps the endpoint from
//! confirming tenant existence to unauthorized callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use tenant_gate_core::TenantName;

use crate::access_review::sort_tenants;
use crate::auth::extract_credential;
use crate::gateway::PERMISSION_DENIED_CODE;
use crate::gateway::error_response;
use crate::server::ServerState;

// ============================================================================
// SECTION: Candidate Assembly
// ============================================================================

/// Unions candidate tenants from enumeration, the caller header, and the
/// configured fallback list.
///
/// The fallback list applies only when service-identity enumeration returned
/// nothing; a caller-supplied header tenant alone does not suppress it. The
/// result is sorted case-insensitively with duplicates removed.
#[must_use]
pub fn assemble_candidates(
    enumerated: Vec<TenantName>,
    header_tenant: Option<TenantName>,
    fallback: &[TenantName],
) -> Vec<TenantName> {
    let enumeration_empty = enumerated.is_empty();
    let mut candidates = enumerated;
    if let Some(tenant) = header_tenant {
        candidates.push(tenant);
    }
    if enumeration_empty {
        candidates.extend(fallback.iter().cloned());
    }
    sort_tenants(&mut candidates);
    candidates
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Serves the tenant discovery endpoint.
pub async fn handle_discovery(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Response {
    let enumerated = state.reviewer.list_all_tenants().await;
    let header_tenant = headers
        .get(state.tenant_header.as_str())
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| TenantName::parse(raw.trim()).ok());
    let candidates = assemble_candidates(enumerated, header_tenant, &state.fallback_candidates);

    let credential = extract_credential(&headers);
    let accessible = state.reviewer.filter_accessible(credential.as_ref(), &candidates).await;
    if accessible.is_empty() {
        return error_response(
            StatusCode::FORBIDDEN,
            PERMISSION_DENIED_CODE,
            "No accessible tenants for the provided credential.",
        );
    }
    let names: Vec<&str> = accessible.iter().map(TenantName::as_str).collect();
    (StatusCode::OK, Json(serde_json::json!({ "namespaces": names }))).into_response()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
