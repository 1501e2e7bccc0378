// crates/tenant-gate-config/src/config.rs
// ============================================================================
// Module: Tenant Gate Configuration
// Description: Configuration loading and validation for the tenant gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: tenant-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is validated before the gateway starts. Missing or invalid
//! configuration fails closed rather than degrading to permissive behavior.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use tenant_gate_core::TenantName;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "tenant-gate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "TENANT_GATE_CONFIG";
/// Environment variable overriding the discovery fallback tenant list.
pub(crate) const TENANT_CANDIDATES_ENV_VAR: &str = "TENANT_GATE_TENANT_CANDIDATES";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum accepted request body size in bytes.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 256 * 1024 * 1024;
/// Maximum number of discovery fallback tenant candidates.
pub(crate) const MAX_TENANT_CANDIDATES: usize = 256;
/// Maximum number of operator-supplied exempt path prefixes.
pub(crate) const MAX_EXEMPT_PATHS: usize = 64;
/// Maximum length of the tenant header name.
pub(crate) const MAX_HEADER_NAME_LENGTH: usize = 128;
/// Maximum length of the access-review API group.
pub(crate) const MAX_API_GROUP_LENGTH: usize = 253;
/// Minimum allowed connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum allowed connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Minimum allowed request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum allowed request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default upstream connect timeout in milliseconds.
pub(crate) const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_MS: u64 = 1_000;
/// Default upstream request timeout in milliseconds.
pub(crate) const DEFAULT_UPSTREAM_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default access-review connect timeout in milliseconds.
pub(crate) const DEFAULT_REVIEW_CONNECT_TIMEOUT_MS: u64 = 1_000;
/// Default access-review request timeout in milliseconds.
pub(crate) const DEFAULT_REVIEW_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Default tenant enumeration timeout in milliseconds.
pub(crate) const DEFAULT_ENUMERATION_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Tenant gateway configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TenantGateConfig {
    /// Gateway listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream tracking service configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Kubernetes access-review configuration.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Tenant discovery configuration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Request gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl TenantGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The discovery fallback tenant list may be overridden with a
    /// comma-separated `TENANT_GATE_TENANT_CANDIDATES` environment value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        if let Ok(raw) = env::var(TENANT_CANDIDATES_ENV_VAR) {
            let candidates = parse_tenant_candidates(&raw);
            if !candidates.is_empty() {
                config.discovery.fallback_candidates = candidates;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.upstream.validate()?;
        self.cluster.validate()?;
        self.discovery.validate()?;
        self.gateway.validate()
    }
}

/// Gateway listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the gateway listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Optional TLS termination configuration.
    #[serde(default)]
    pub tls: Option<ServerTlsConfig>,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            tls: None,
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))
    }

    /// Validates listener configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind is required".to_string()));
        }
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid("server.max_body_bytes exceeds limit".to_string()));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        self.audit.validate()
    }
}

/// TLS termination configuration for the gateway listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTlsConfig {
    /// Server certificate chain (PEM).
    pub cert_path: String,
    /// Server private key (PEM).
    pub key_path: String,
}

impl ServerTlsConfig {
    /// Validates TLS configuration paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("server.tls.cert_path", &self.cert_path)?;
        validate_path_string("server.tls.key_path", &self.key_path)
    }
}

/// Audit logging configuration for gateway decisions.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

/// Upstream tracking service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the tracking service fronted by the gateway.
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_upstream_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    #[serde(default = "default_upstream_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            connect_timeout_ms: default_upstream_connect_timeout_ms(),
            request_timeout_ms: default_upstream_request_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    /// Validates upstream forwarding configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("upstream.base_url", &self.base_url)?;
        validate_timeout_range(
            "upstream.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "upstream.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )
    }
}

/// Kubernetes access-review configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Base URL of the Kubernetes API server.
    #[serde(default = "default_cluster_api_url")]
    pub api_url: String,
    /// Optional CA bundle path for the API server (PEM). When unset, the
    /// conventional in-cluster mount applies if the file exists.
    #[serde(default)]
    pub ca_bundle_path: Option<String>,
    /// Path to the service-account token used for tenant enumeration.
    #[serde(default = "default_service_account_token_path")]
    pub service_account_token_path: String,
    /// Skip TLS verification for the API server (explicit opt-in only).
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    /// API group checked by access reviews.
    #[serde(default = "default_api_group")]
    pub api_group: String,
    /// Connect timeout for access-review calls in milliseconds.
    #[serde(default = "default_review_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout for access-review calls in milliseconds.
    #[serde(default = "default_review_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Request timeout for tenant enumeration in milliseconds.
    #[serde(default = "default_enumeration_timeout_ms")]
    pub enumeration_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: default_cluster_api_url(),
            ca_bundle_path: None,
            service_account_token_path: default_service_account_token_path(),
            insecure_skip_tls_verify: false,
            api_group: default_api_group(),
            connect_timeout_ms: default_review_connect_timeout_ms(),
            request_timeout_ms: default_review_request_timeout_ms(),
            enumeration_timeout_ms: default_enumeration_timeout_ms(),
        }
    }
}

impl ClusterConfig {
    /// Validates access-review configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("cluster.api_url", &self.api_url)?;
        if let Some(path) = &self.ca_bundle_path {
            validate_path_string("cluster.ca_bundle_path", path)?;
            if self.insecure_skip_tls_verify {
                return Err(ConfigError::Invalid(
                    "cluster.ca_bundle_path must not be set with insecure_skip_tls_verify"
                        .to_string(),
                ));
            }
        }
        validate_path_string(
            "cluster.service_account_token_path",
            &self.service_account_token_path,
        )?;
        validate_api_group("cluster.api_group", &self.api_group)?;
        validate_timeout_range(
            "cluster.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "cluster.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "cluster.enumeration_timeout_ms",
            self.enumeration_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )
    }
}

/// Tenant discovery configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DiscoveryConfig {
    /// Fallback tenant candidates used when enumeration returns nothing.
    #[serde(default)]
    pub fallback_candidates: Vec<String>,
}

impl DiscoveryConfig {
    /// Validates discovery configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_tenant_candidates("discovery.fallback_candidates", &self.fallback_candidates)
    }
}

/// Request gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Header carrying the target tenant name.
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,
    /// Additional exempt path prefixes beyond the built-in set.
    #[serde(default)]
    pub extra_exempt_paths: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tenant_header: default_tenant_header(),
            extra_exempt_paths: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Validates gateway configuration and normalizes the header name.
    fn validate(&mut self) -> Result<(), ConfigError> {
        validate_header_name("gateway.tenant_header", &self.tenant_header)?;
        self.tenant_header = self.tenant_header.trim().to_ascii_lowercase();
        if self.extra_exempt_paths.len() > MAX_EXEMPT_PATHS {
            return Err(ConfigError::Invalid(
                "gateway.extra_exempt_paths exceeds entry limit".to_string(),
            ));
        }
        for path in &self.extra_exempt_paths {
            validate_exempt_path("gateway.extra_exempt_paths", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an http(s) URL string.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} is required")));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|_| ConfigError::Invalid(format!("{field} must be a valid URL")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::Invalid(format!("{field} must use http or https")));
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    Ok(())
}

/// Validates an HTTP header name.
fn validate_header_name(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} is required")));
    }
    if trimmed.len() > MAX_HEADER_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let valid = trimmed.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
    if !valid {
        return Err(ConfigError::Invalid(format!(
            "{field} must contain only alphanumerics and hyphens",
        )));
    }
    Ok(())
}

/// Validates the access-review API group string.
fn validate_api_group(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} is required")));
    }
    if trimmed.len() > MAX_API_GROUP_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let valid = trimmed
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '.' || ch == '-');
    if !valid {
        return Err(ConfigError::Invalid(format!(
            "{field} must be a lowercase dns-style group name",
        )));
    }
    Ok(())
}

/// Validates an operator-supplied exempt path prefix.
fn validate_exempt_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
    }
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} entries must start with '/'")));
    }
    if value.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} entries exceed max length")));
    }
    if value.chars().any(|ch| ch.is_ascii_whitespace() || ch.is_ascii_control()) {
        return Err(ConfigError::Invalid(format!(
            "{field} entries must not contain whitespace or control characters",
        )));
    }
    Ok(())
}

/// Validates a list of tenant name candidates.
fn validate_tenant_candidates(field: &str, candidates: &[String]) -> Result<(), ConfigError> {
    if candidates.len() > MAX_TENANT_CANDIDATES {
        return Err(ConfigError::Invalid(format!("{field} exceeds entry limit")));
    }
    for candidate in candidates {
        if TenantName::parse(candidate.as_str()).is_err() {
            return Err(ConfigError::Invalid(format!(
                "{field} entry '{candidate}' must match the tenant name grammar",
            )));
        }
    }
    Ok(())
}

/// Splits a comma-separated tenant candidate list into trimmed entries.
///
/// Empty segments are dropped. This is the parsing rule for the
/// `TENANT_GATE_TENANT_CANDIDATES` environment override.
#[must_use]
pub fn parse_tenant_candidates(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Default gateway bind address.
pub(crate) fn default_bind() -> String {
    "127.0.0.1:5001".to_string()
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

/// Default audit logging toggle.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

/// Default upstream tracking service URL.
pub(crate) fn default_upstream_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

/// Default upstream connect timeout in milliseconds.
pub(crate) const fn default_upstream_connect_timeout_ms() -> u64 {
    DEFAULT_UPSTREAM_CONNECT_TIMEOUT_MS
}

/// Default upstream request timeout in milliseconds.
pub(crate) const fn default_upstream_request_timeout_ms() -> u64 {
    DEFAULT_UPSTREAM_REQUEST_TIMEOUT_MS
}

/// Default in-cluster Kubernetes API URL.
pub(crate) fn default_cluster_api_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

/// Default in-cluster service-account token path.
pub(crate) fn default_service_account_token_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string()
}

/// Default access-review API group.
pub(crate) fn default_api_group() -> String {
    "community.mlflow.org".to_string()
}

/// Default access-review connect timeout in milliseconds.
pub(crate) const fn default_review_connect_timeout_ms() -> u64 {
    DEFAULT_REVIEW_CONNECT_TIMEOUT_MS
}

/// Default access-review request timeout in milliseconds.
pub(crate) const fn default_review_request_timeout_ms() -> u64 {
    DEFAULT_REVIEW_REQUEST_TIMEOUT_MS
}

/// Default tenant enumeration timeout in milliseconds.
pub(crate) const fn default_enumeration_timeout_ms() -> u64 {
    DEFAULT_ENUMERATION_TIMEOUT_MS
}

/// Default tenant selection header.
pub(crate) fn default_tenant_header() -> String {
    "x-mlflow-namespace".to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
