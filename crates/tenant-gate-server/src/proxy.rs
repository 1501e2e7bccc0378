// crates/tenant-gate-server/src/proxy.rs
// ============================================================================
// Module: Upstream Proxy
// Description: Buffered reverse proxy to the fronted tracking service.
// Purpose: Forward authorized requests upstream with bounded buffering.
// Dependencies: tenant-gate-config, axum, reqwest
// ============================================================================

//! ## Overview
//! Requests that clear the gateway are forwarded verbatim to the upstream
//! tracking service: same method, path, query, headers, and body, with
//! hop-by-hop headers stripped and the gateway's correlation id attached.
//! Bodies are buffered with a configured cap so a single request cannot pin
//! unbounded memory. Upstream responses pass through unchanged; only a
//! connect or read failure is replaced by the gateway's own 502 payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::Response;
use reqwest::Client;
use tenant_gate_config::UpstreamConfig;
use thiserror::Error;

use crate::correlation::REQUEST_ID_HEADER;
use crate::gateway::INVALID_PARAMETER_CODE;
use crate::gateway::error_response;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Outward error code for upstream transport failures.
const INTERNAL_ERROR_CODE: &str = "INTERNAL_ERROR";

/// Hop-by-hop headers never forwarded in either direction.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upstream proxy construction failures.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The forwarding HTTP client could not be built.
    #[error("proxy client error: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Proxy
// ============================================================================

/// Buffered reverse proxy to the upstream tracking service.
///
/// # Invariants
/// - The base URL is normalized without a trailing slash.
/// - Request bodies never buffer beyond `max_body_bytes`.
pub struct UpstreamProxy {
    /// Upstream base URL (no trailing slash).
    base_url: String,
    /// Forwarding HTTP client.
    client: Client,
    /// Maximum buffered request body size in bytes.
    max_body_bytes: usize,
}

impl UpstreamProxy {
    /// Builds a proxy from validated upstream configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Client`] when the HTTP client cannot be built.
    pub fn from_config(
        upstream: &UpstreamConfig,
        max_body_bytes: usize,
    ) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(upstream.connect_timeout_ms))
            .timeout(Duration::from_millis(upstream.request_timeout_ms))
            .build()
            .map_err(|err| ProxyError::Client(err.to_string()))?;
        let mut base_url = upstream.base_url.clone();
        let trimmed_len = base_url.trim_end_matches('/').len();
        base_url.truncate(trimmed_len);
        Ok(Self {
            base_url,
            client,
            max_body_bytes,
        })
    }

    /// Forwards one authorized request upstream and returns the response.
    pub async fn forward(&self, request_id: &str, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let Ok(bytes) = axum::body::to_bytes(body, self.max_body_bytes).await else {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                INVALID_PARAMETER_CODE,
                &format!("Request body exceeds {} bytes.", self.max_body_bytes),
            );
        };

        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());
        let url = format!("{}{}", self.base_url, path_and_query);

        let mut headers = filter_headers(&parts.headers);
        headers.remove("host");
        if !request_id.is_empty()
            && let Ok(value) = HeaderValue::from_str(request_id)
        {
            headers.insert(REQUEST_ID_HEADER, value);
        }

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(bytes)
            .send()
            .await;
        let upstream = match upstream {
            Ok(upstream) => upstream,
            Err(_) => {
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    INTERNAL_ERROR_CODE,
                    "Upstream tracking service is unreachable.",
                );
            }
        };

        let status = upstream.status();
        let response_headers = filter_headers(upstream.headers());
        let Ok(payload) = upstream.bytes().await else {
            return error_response(
                StatusCode::BAD_GATEWAY,
                INTERNAL_ERROR_CODE,
                "Upstream response could not be read.",
            );
        };

        let mut response = Response::new(Body::from(payload));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        response
    }
}

/// Copies headers minus hop-by-hop entries and stale framing lengths.
fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers {
        let lowered = name.as_str();
        if HOP_BY_HOP_HEADERS.contains(&lowered) || lowered == "content-length" {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
