// crates/tenant-gate-server/src/auth.rs
// ============================================================================
// Module: Credential Extraction
// Description: Bearer credential and acting-user extraction from headers.
// Purpose: Provide fail-closed credential handling without token leakage.
// Dependencies: axum, sha2
// ============================================================================

//! ## Overview
//! Callers present a bearer token in one of three locations, checked in
//! priority order: the `authorization` header, the
//! `x-forwarded-access-token` header set by auth proxies, and the
//! `mlflow.k8s.bearerToken` session cookie. A location that is present but
//! malformed or oversized is skipped rather than failing the request, so a
//! stale cookie cannot mask a valid header. Raw tokens never appear in logs;
//! audit records carry a short digest fingerprint instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use axum::http::HeaderMap;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying tokens forwarded by an authenticating proxy.
const FORWARDED_TOKEN_HEADER: &str = "x-forwarded-access-token";
/// Session cookie name carrying a bearer token for browser clients.
const SESSION_COOKIE_NAME: &str = "mlflow.k8s.bearerToken";
/// Header carrying the acting user asserted by an authenticating proxy.
const ACTING_USER_HEADER: &str = "x-forwarded-user";
/// Maximum accepted size for any credential-bearing header value.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Number of leading hex characters retained in token fingerprints.
const FINGERPRINT_HEX_LENGTH: usize = 16;

// ============================================================================
// SECTION: Bearer Credential
// ============================================================================

/// Opaque bearer credential extracted for a single request.
///
/// # Invariants
/// - The raw token is never serialized and the `Debug` form is redacted.
/// - Lives for one request evaluation; never cached across requests.
#[derive(Clone)]
pub struct BearerCredential {
    /// Raw bearer token value.
    token: String,
}

impl BearerCredential {
    /// Wraps a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Returns the raw token for forwarding to the access-review authority.
    ///
    /// The value must not be written to logs or error messages; use
    /// [`BearerCredential::fingerprint`] for anything user or operator
    /// visible.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns a short, log-safe digest of the token.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.token.as_bytes());
        let mut hex = String::with_capacity(FINGERPRINT_HEX_LENGTH);
        for byte in digest.iter().take(FINGERPRINT_HEX_LENGTH / 2) {
            let _ = write!(hex, "{byte:02x}");
        }
        format!("sha256:{hex}")
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerCredential({})", self.fingerprint())
    }
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts the caller's bearer credential from request headers.
///
/// Locations are checked in priority order: `authorization` with the
/// `bearer` scheme, then [`FORWARDED_TOKEN_HEADER`], then the
/// [`SESSION_COOKIE_NAME`] cookie. Returns `None` when no location yields a
/// usable token; the authorization decision for that case belongs to the
/// access-review layer.
#[must_use]
pub fn extract_credential(headers: &HeaderMap) -> Option<BearerCredential> {
    if let Some(token) = bearer_from_authorization(headers) {
        return Some(BearerCredential::new(token));
    }
    if let Some(token) = forwarded_access_token(headers) {
        return Some(BearerCredential::new(token));
    }
    session_cookie_token(headers).map(BearerCredential::new)
}

/// Reads the advisory acting-user header.
///
/// The value is informational for audit records only; it carries no
/// authority and is never used for authorization decisions.
#[must_use]
pub fn acting_user(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, ACTING_USER_HEADER)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Returns a size-capped header value as a string, when readable.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let value = headers.get(name)?;
    if value.as_bytes().len() > MAX_AUTH_HEADER_BYTES {
        return None;
    }
    value.to_str().ok()
}

/// Parses a bearer token out of the `authorization` header.
fn bearer_from_authorization(headers: &HeaderMap) -> Option<String> {
    let header = header_str(headers, "authorization")?;
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Reads a token forwarded by an authenticating proxy.
fn forwarded_access_token(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, FORWARDED_TOKEN_HEADER)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Scans cookie headers for the session bearer token.
fn session_cookie_token(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all("cookie") {
        if value.as_bytes().len() > MAX_AUTH_HEADER_BYTES {
            continue;
        }
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            let Some((name, token)) = pair.split_once('=') else {
                continue;
            };
            if name.trim() == SESSION_COOKIE_NAME {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

// ============================================================================
// SECTION: Tests
// ============================================================================
