// crates/tenant-gate-core/tests/tenant_validation.rs
// ============================================================================
// Module: Tenant Validation Tests
// Description: Tests for tenant identity grammar enforcement.
// Purpose: Ensure malformed tenant identities never pass validation.
// Dependencies: tenant-gate-core, serde_json
// ============================================================================

//! ## Overview
//! Validates the restricted tenant naming grammar and the request context
//! wrapper that carries a validated tenant downstream.
//!
//! Security posture: Every isolation decision keys off a validated tenant.
//! Threat model: TM-TENANT-001 - Malformed tenant identities crossing the gate.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use tenant_gate_core::MAX_TENANT_NAME_LEN;
use tenant_gate_core::TenantContext;
use tenant_gate_core::TenantName;
use tenant_gate_core::TenantNameError;

/// Verifies well-formed tenant identities parse and round-trip.
#[test]
fn tenant_name_accepts_restricted_grammar() {
    for candidate in ["team-a", "a", "0", "team-a-1", "a0-b1", "abc123"] {
        let tenant = TenantName::parse(candidate).expect("valid tenant");
        assert_eq!(tenant.as_str(), candidate);
        assert_eq!(tenant.to_string(), candidate);
    }
}

/// Verifies uppercase letters and underscores are rejected.
#[test]
fn tenant_name_rejects_bad_characters() {
    for candidate in ["Team_A", "team_a", "TEAM", "team.a", "team a", "tëam"] {
        let err = TenantName::parse(candidate).expect_err("invalid tenant");
        assert!(matches!(err, TenantNameError::BadSyntax), "{candidate}: {err}");
    }
}

/// Verifies identities may not start or end with a hyphen.
#[test]
fn tenant_name_rejects_edge_hyphens() {
    for candidate in ["-team", "team-", "-", "-team-"] {
        let err = TenantName::parse(candidate).expect_err("invalid tenant");
        assert!(matches!(err, TenantNameError::BadSyntax), "{candidate}: {err}");
    }
}

/// Verifies the empty identity is rejected with its own error.
#[test]
fn tenant_name_rejects_empty() {
    let err = TenantName::parse("").expect_err("empty tenant");
    assert!(matches!(err, TenantNameError::Empty));
    assert_eq!(err.label(), "empty");
}

/// Verifies the length ceiling sits at 253 characters.
#[test]
fn tenant_name_enforces_length_ceiling() {
    let longest = "a".repeat(MAX_TENANT_NAME_LEN);
    assert!(TenantName::parse(longest).is_ok());

    let too_long = "a".repeat(MAX_TENANT_NAME_LEN + 1);
    let err = TenantName::parse(too_long).expect_err("overlong tenant");
    assert!(matches!(err, TenantNameError::TooLong { len: 254 }));
    assert_eq!(err.label(), "too_long");
}

/// Verifies tenant names serialize as bare strings.
#[test]
fn tenant_name_serializes_transparently() {
    let tenant = TenantName::parse("team-a").expect("valid tenant");
    let json = serde_json::to_string(&tenant).expect("serialize");
    assert_eq!(json, "\"team-a\"");

    let decoded: TenantName = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, tenant);
}

/// Verifies deserialization re-validates the grammar.
#[test]
fn tenant_name_deserialization_rejects_invalid_input() {
    for payload in ["\"-bad-\"", "\"Team_A\"", "\"\""] {
        assert!(serde_json::from_str::<TenantName>(payload).is_err(), "{payload}");
    }
}

/// Verifies the context carries the tenant and an optional resolved user.
#[test]
fn tenant_context_carries_optional_user() {
    let tenant = TenantName::parse("team-a").expect("valid tenant");
    let anonymous = TenantContext::new(tenant.clone());
    assert_eq!(anonymous.tenant, tenant);
    assert!(anonymous.user.is_none());

    let attributed = TenantContext::new(tenant).with_user("alice");
    assert_eq!(attributed.user.as_deref(), Some("alice"));
}
