// crates/tenant-gate-core/src/core/tenant.rs
// ============================================================================
// Module: Tenant Identity
// Description: Validated tenant names and per-request tenant context.
// Purpose: Make the isolation boundary a typed value that cannot be malformed.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A tenant is the isolation boundary every entity and permission is scoped
//! to. [`TenantName`] can only be constructed through validation, so every
//! downstream component may assume the grammar holds. [`TenantContext`] is the
//! request-scoped carrier for the active tenant; it is created once per
//! request and never stored in process-wide state, which is the invariant
//! keeping concurrent requests from different tenants isolated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted tenant name length in bytes.
pub const MAX_TENANT_NAME_LEN: usize = 253;

// ============================================================================
// SECTION: Tenant Name
// ============================================================================

/// Validated tenant name.
///
/// # Invariants
/// - 1 to 253 bytes long.
/// - Lowercase ASCII alphanumerics and `-` only.
/// - Never starts or ends with `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantName(String);

impl TenantName {
    /// Parses and validates a tenant name.
    ///
    /// # Errors
    ///
    /// Returns [`TenantNameError`] when the candidate violates the grammar.
    pub fn parse(candidate: impl Into<String>) -> Result<Self, TenantNameError> {
        let candidate = candidate.into();
        if candidate.is_empty() {
            return Err(TenantNameError::Empty);
        }
        if candidate.len() > MAX_TENANT_NAME_LEN {
            return Err(TenantNameError::TooLong {
                len: candidate.len(),
            });
        }
        let valid_inner = candidate
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        let valid_edges = !candidate.starts_with('-') && !candidate.ends_with('-');
        if !valid_inner || !valid_edges {
            return Err(TenantNameError::BadSyntax);
        }
        Ok(Self(candidate))
    }

    /// Returns the tenant name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TenantName {
    type Error = TenantNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantName> for String {
    fn from(value: TenantName) -> Self {
        value.0
    }
}

/// Tenant name validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TenantNameError {
    /// The candidate was empty.
    #[error("tenant name must not be empty")]
    Empty,
    /// The candidate exceeded [`MAX_TENANT_NAME_LEN`] bytes.
    #[error("tenant name exceeds {MAX_TENANT_NAME_LEN} bytes ({len})")]
    TooLong {
        /// Observed candidate length in bytes.
        len: usize,
    },
    /// The candidate violated the lowercase-alphanumeric-with-hyphens grammar.
    #[error("tenant name must be lowercase alphanumerics and '-', not edge-hyphenated")]
    BadSyntax,
}

impl TenantNameError {
    /// Returns a stable machine-readable label for the rejection.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong {
                ..
            } => "too_long",
            Self::BadSyntax => "bad_syntax",
        }
    }
}

// ============================================================================
// SECTION: Tenant Context
// ============================================================================

/// Request-scoped tenant context.
///
/// # Invariants
/// - Created once per request by the gateway; immutable afterwards.
/// - Discarded at request end; never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Active tenant for the request.
    pub tenant: TenantName,
    /// Acting user resolved for auditing, when known.
    pub user: Option<String>,
}

impl TenantContext {
    /// Creates a context for a tenant with no resolved user.
    #[must_use]
    pub const fn new(tenant: TenantName) -> Self {
        Self {
            tenant,
            user: None,
        }
    }

    /// Returns a copy of the context with the acting user attached.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}
