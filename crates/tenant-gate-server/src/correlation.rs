// crates/tenant-gate-server/src/correlation.rs
// ============================================================================
// Module: Correlation Policy
// Description: Sanitization and generation for request correlation IDs.
// Purpose: Provide deterministic, fail-closed request id handling.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Client-provided `x-request-id` values are untrusted input and must be
//! sanitized before they reach audit logs or the upstream service. Rejected
//! or absent values are replaced with a server-issued identifier built from
//! a boot-scoped random seed plus a monotonic counter, so every request the
//! gateway evaluates carries exactly one well-formed id.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;

/// Header carrying the request correlation identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Maximum allowed length for client-provided request identifiers.
pub const MAX_REQUEST_ID_LENGTH: usize = 128;

/// Prefix for server-issued request identifiers.
const GENERATED_ID_PREFIX: &str = "tg";

/// Typed rejection reason for invalid client request IDs.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestIdRejection {
    /// Input was empty after trimming.
    EmptyAfterTrim,
    /// Input exceeded the maximum length.
    TooLong,
    /// Input contained a character outside the allowed set.
    DisallowedCharacter,
}

impl RequestIdRejection {
    /// Returns a stable label for this rejection reason.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmptyAfterTrim => "empty_after_trim",
            Self::TooLong => "too_long",
            Self::DisallowedCharacter => "disallowed_character",
        }
    }
}

impl fmt::Display for RequestIdRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Request-scoped correlation identifier attached to forwarded requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Boot-scoped request id generator.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct RequestIdGenerator {
    /// Boot-scoped random identifier for entropy.
    boot_id: u64,
    /// Monotonic counter for IDs issued in this process.
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a new generator seeded from the OS random source.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues a new server request ID.
    #[must_use]
    pub fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:016x}-{:016x}", GENERATED_ID_PREFIX, self.boot_id, seq)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitizes a client-provided request ID using strict character rules.
///
/// Returns `Ok(None)` when no header value is provided. Any invalid value
/// returns a structured rejection reason; callers replace rejected values
/// with a generated id rather than failing the request.
///
/// # Errors
/// Returns [`RequestIdRejection`] when the value is empty, too long, or
/// contains characters outside ASCII alphanumerics plus `-`, `_`, `.`.
pub fn sanitize_request_id(value: Option<&str>) -> Result<Option<String>, RequestIdRejection> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RequestIdRejection::EmptyAfterTrim);
    }
    if trimmed.len() > MAX_REQUEST_ID_LENGTH {
        return Err(RequestIdRejection::TooLong);
    }
    if !trimmed.chars().all(is_request_id_char) {
        return Err(RequestIdRejection::DisallowedCharacter);
    }
    Ok(Some(trimmed.to_string()))
}

/// Returns true when the character is allowed in a request identifier.
const fn is_request_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')
}

// ============================================================================
// SECTION: Tests
// ============================================================================
