// crates/tenant-gate-server/src/server.rs
// ============================================================================
// Module: Server Assembly
// Description: Router construction and gateway server lifecycle.
// Purpose: Wire the gateway, discovery, and proxy into a served application.
// Dependencies: tenant-gate-config, axum, axum-server, tokio
// ============================================================================

//! ## Overview
//! Assembles the running gateway: the shared [`ServerState`], the axum router
//! (discovery route plus a proxy fallback, both behind the authorization
//! middleware), and the listener lifecycle with graceful shutdown. TLS
//! termination is optional; binding a non-loopback address without it emits a
//! startup warning because bearer tokens would transit in cleartext.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum_server::tls_rustls::RustlsConfig;
use tenant_gate_config::ServerAuditConfig;
use tenant_gate_config::ServerTlsConfig;
use tenant_gate_config::TenantGateConfig;
use tenant_gate_core::TenantName;
use thiserror::Error;

use crate::access_review::AccessReviewer;
use crate::access_review::KubernetesAccessReviewer;
use crate::audit::FileAuditSink;
use crate::audit::GatewayAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::correlation::RequestId;
use crate::discovery::handle_discovery;
use crate::gateway::AuthorizationGateway;
use crate::gateway::DISCOVERY_PATH;
use crate::gateway::authorize_middleware;
use crate::proxy::UpstreamProxy;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server lifecycle errors.
#[derive(Debug, Error)]
pub enum GatewayServerError {
    /// Configuration rejected during startup.
    #[error("config error: {0}")]
    Config(String),
    /// Component construction failed.
    #[error("init error: {0}")]
    Init(String),
    /// Listener or transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state behind every route and the authorization middleware.
pub struct ServerState {
    /// Request authorization gateway.
    pub(crate) gateway: AuthorizationGateway,
    /// Access-review authority, shared with the discovery handler.
    pub(crate) reviewer: Arc<dyn AccessReviewer>,
    /// Upstream forwarder.
    pub(crate) proxy: UpstreamProxy,
    /// Tenant header name, lower-cased.
    pub(crate) tenant_header: String,
    /// Validated discovery fallback candidates.
    pub(crate) fallback_candidates: Vec<TenantName>,
}

impl ServerState {
    /// Builds server state from validated configuration and injected seams.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError::Init`] when the upstream proxy client
    /// cannot be built.
    pub fn new(
        config: &TenantGateConfig,
        reviewer: Arc<dyn AccessReviewer>,
        audit: Arc<dyn GatewayAuditSink>,
        metrics: Arc<dyn GatewayMetrics>,
    ) -> Result<Self, GatewayServerError> {
        let proxy = UpstreamProxy::from_config(&config.upstream, config.server.max_body_bytes)
            .map_err(|err| GatewayServerError::Init(err.to_string()))?;
        let gateway =
            AuthorizationGateway::new(Arc::clone(&reviewer), audit, metrics, &config.gateway);
        let fallback_candidates = config
            .discovery
            .fallback_candidates
            .iter()
            .filter_map(|name| TenantName::parse(name.clone()).ok())
            .collect();
        Ok(Self {
            gateway,
            reviewer,
            proxy,
            tenant_header: config.gateway.tenant_header.to_ascii_lowercase(),
            fallback_candidates,
        })
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the gateway router over shared state.
///
/// The discovery route is served locally; every other path falls through to
/// the upstream proxy. Both sit behind the authorization middleware.
#[must_use]
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(DISCOVERY_PATH, get(handle_discovery))
        .fallback(proxy_handler)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), authorize_middleware))
        .with_state(state)
}

/// Fallback handler forwarding authorized requests upstream.
async fn proxy_handler(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone());
    state.proxy.forward(&request_id, request).await
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Configured gateway server ready to serve.
pub struct TenantGateServer {
    /// Validated configuration.
    config: TenantGateConfig,
    /// Shared route state.
    state: Arc<ServerState>,
}

impl TenantGateServer {
    /// Builds a server with the Kubernetes access reviewer.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when configuration is invalid or a
    /// component cannot be constructed.
    pub fn from_config(mut config: TenantGateConfig) -> Result<Self, GatewayServerError> {
        config.validate().map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let reviewer: Arc<dyn AccessReviewer> = Arc::new(
            KubernetesAccessReviewer::from_config(&config.cluster)
                .map_err(|err| GatewayServerError::Init(err.to_string()))?,
        );
        Self::with_reviewer(config, reviewer)
    }

    /// Builds a server with an injected access reviewer.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when configuration is invalid or a
    /// component cannot be constructed.
    pub fn with_reviewer(
        mut config: TenantGateConfig,
        reviewer: Arc<dyn AccessReviewer>,
    ) -> Result<Self, GatewayServerError> {
        config.validate().map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config.server.audit)?;
        let metrics: Arc<dyn GatewayMetrics> = Arc::new(NoopMetrics);
        let state = Arc::new(ServerState::new(&config, reviewer, audit, metrics)?);
        Ok(Self {
            config,
            state,
        })
    }

    /// Serves the gateway until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError::Transport`] when binding or serving
    /// fails.
    pub async fn serve(self) -> Result<(), GatewayServerError> {
        let addr = self
            .config
            .server
            .bind_addr()
            .map_err(|err| GatewayServerError::Config(err.to_string()))?;
        emit_plaintext_warning(&addr, self.config.server.tls.is_some());
        let router = build_router(Arc::clone(&self.state));
        match &self.config.server.tls {
            Some(tls) => serve_tls(addr, router, tls).await,
            None => serve_tcp(addr, router).await,
        }
    }
}

/// Selects the audit sink for the configured mode.
fn build_audit_sink(
    audit: &ServerAuditConfig,
) -> Result<Arc<dyn GatewayAuditSink>, GatewayServerError> {
    if !audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &audit.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| GatewayServerError::Init(format!("audit file: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Serving
// ============================================================================

/// Serves plain TCP with graceful shutdown on ctrl-c.
async fn serve_tcp(addr: SocketAddr, router: Router) -> Result<(), GatewayServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| GatewayServerError::Transport(format!("http bind failed: {err}")))?;
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| GatewayServerError::Transport(err.to_string()))
}

/// Serves TLS via axum-server with graceful shutdown on ctrl-c.
async fn serve_tls(
    addr: SocketAddr,
    router: Router,
    tls: &ServerTlsConfig,
) -> Result<(), GatewayServerError> {
    let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|err| GatewayServerError::Transport(format!("tls config failed: {err}")))?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
    });
    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|err| GatewayServerError::Transport(err.to_string()))
}

/// Resolves on ctrl-c.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// ============================================================================
// SECTION: Warnings
// ============================================================================

/// Returns whether the bind warrants a cleartext-token warning.
fn needs_plaintext_warning(addr: &SocketAddr, tls_enabled: bool) -> bool {
    !tls_enabled && !addr.ip().is_loopback()
}

/// Warns once at startup when tokens would transit in cleartext.
fn emit_plaintext_warning(addr: &SocketAddr, tls_enabled: bool) {
    if !needs_plaintext_warning(addr, tls_enabled) {
        return;
    }
    let _ = writeln!(
        std::io::stderr(),
        "warning: binding {addr} without TLS; bearer tokens will transit in cleartext"
    );
}

// ============================================================================
// SECTION: Tests
// ============================================================================
