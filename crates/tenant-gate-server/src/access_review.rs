// crates/tenant-gate-server/src/access_review.rs
// ============================================================================
// Module: Access Review
// Description: Delegated authorization backends for gateway decisions.
// Purpose: Enforce per-tenant access with a fail-closed review authority.
// Dependencies: tenant-gate-core, tenant-gate-config, reqwest
// ============================================================================

//! ## Overview
//! The gateway never decides permissions itself: every request is resolved
//! through an [`AccessReviewer`], which answers whether the caller's
//! credential may perform a `(resource, verb)` pair inside a tenant. The
//! production implementation submits Kubernetes `SelfSubjectAccessReview`
//! objects with the caller's own token, so grants live entirely in cluster
//! RBAC. Authority outages surface as a distinct error the gateway collapses
//! into a denial; they are never treated as permission.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Certificate;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use tenant_gate_config::ClusterConfig;
use tenant_gate_core::ApiResource;
use tenant_gate_core::ApiVerb;
use tenant_gate_core::TenantName;
use thiserror::Error;

use crate::auth::BearerCredential;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Kubernetes SelfSubjectAccessReview collection path.
const ACCESS_REVIEW_PATH: &str = "/apis/authorization.k8s.io/v1/selfsubjectaccessreviews";
/// Kubernetes namespace enumeration path.
const NAMESPACE_LIST_PATH: &str = "/api/v1/namespaces";
/// Conventional CA bundle mount inside a pod.
const IN_CLUSTER_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

// ============================================================================
// SECTION: Public Types
// ============================================================================

/// Authority decision for one `(tenant, resource, verb)` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The credential may perform the action.
    Allowed,
    /// The authority refused the action.
    Denied {
        /// Reason stated by the authority.
        reason: String,
    },
}

/// Access review failures.
///
/// # Invariants
/// - Variants are stable for error classification; `Unavailable` must never
///   be collapsed into a permission grant.
#[derive(Debug, Error)]
pub enum AccessReviewError {
    /// Credential missing or rejected by the authority.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Authority unreachable or malfunctioning.
    #[error("access review unavailable: {0}")]
    Unavailable(String),
}

/// Delegated authorization interface.
#[async_trait]
pub trait AccessReviewer: Send + Sync {
    /// Authorizes one action for the caller's credential.
    ///
    /// # Errors
    ///
    /// Returns [`AccessReviewError`] when the credential cannot be evaluated
    /// at all; a well-formed refusal is `Ok(AccessDecision::Denied)`.
    async fn authorize(
        &self,
        credential: Option<&BearerCredential>,
        tenant: &TenantName,
        resource: ApiResource,
        verb: ApiVerb,
    ) -> Result<AccessDecision, AccessReviewError>;

    /// Lists every tenant known to the service identity.
    ///
    /// Enumeration is best-effort: any failure yields an empty list rather
    /// than an error, because discovery has other candidate sources.
    async fn list_all_tenants(&self) -> Vec<TenantName>;

    /// Filters candidates down to tenants the credential can access.
    ///
    /// A candidate is kept when at least one resource family grants `list`.
    /// A probe error abandons the candidate; a missing credential yields an
    /// empty result without probing.
    async fn filter_accessible(
        &self,
        credential: Option<&BearerCredential>,
        candidates: &[TenantName],
    ) -> Vec<TenantName> {
        let Some(credential) = credential else {
            return Vec::new();
        };
        let mut accessible = Vec::new();
        for tenant in candidates {
            for resource in ApiResource::ALL {
                match self.authorize(Some(credential), tenant, resource, ApiVerb::List).await {
                    Ok(AccessDecision::Allowed) => {
                        accessible.push(tenant.clone());
                        break;
                    }
                    Ok(AccessDecision::Denied {
                        ..
                    }) => {}
                    Err(_) => break,
                }
            }
        }
        sort_tenants(&mut accessible);
        accessible
    }
}

/// Sorts tenants case-insensitively and removes duplicates.
pub(crate) fn sort_tenants(tenants: &mut Vec<TenantName>) {
    tenants.sort_by(|a, b| a.as_str().to_lowercase().cmp(&b.as_str().to_lowercase()));
    tenants.dedup();
}

// ============================================================================
// SECTION: Kubernetes Reviewer
// ============================================================================

/// Kubernetes SelfSubjectAccessReview-backed reviewer.
///
/// # Invariants
/// - Reviews are submitted with the caller's token, never the service
///   identity, so the cluster answers for the caller's own permissions.
/// - The API URL is normalized without a trailing slash.
pub struct KubernetesAccessReviewer {
    /// Kubernetes API server URL (no trailing slash).
    api_url: String,
    /// API group named in review resource attributes.
    api_group: String,
    /// Path to the service-account token used for enumeration.
    service_account_token_path: PathBuf,
    /// HTTP client for access reviews.
    review_client: Client,
    /// HTTP client for namespace enumeration.
    enumeration_client: Client,
}

impl KubernetesAccessReviewer {
    /// Builds a reviewer from validated cluster configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AccessReviewError::Unavailable`] when the HTTP clients
    /// cannot be built or the CA bundle cannot be loaded.
    pub fn from_config(cluster: &ClusterConfig) -> Result<Self, AccessReviewError> {
        let connect_timeout = Duration::from_millis(cluster.connect_timeout_ms);
        let review_client =
            build_cluster_client(cluster, connect_timeout, cluster.request_timeout_ms)?;
        let enumeration_client =
            build_cluster_client(cluster, connect_timeout, cluster.enumeration_timeout_ms)?;
        let mut api_url = cluster.api_url.clone();
        let trimmed_len = api_url.trim_end_matches('/').len();
        api_url.truncate(trimmed_len);
        Ok(Self {
            api_url,
            api_group: cluster.api_group.clone(),
            service_account_token_path: PathBuf::from(&cluster.service_account_token_path),
            review_client,
            enumeration_client,
        })
    }

    /// Builds the review payload for one authorization request.
    fn review_payload(
        &self,
        tenant: &TenantName,
        resource: ApiResource,
        verb: ApiVerb,
    ) -> SelfSubjectAccessReview {
        SelfSubjectAccessReview {
            api_version: "authorization.k8s.io/v1",
            kind: "SelfSubjectAccessReview",
            spec: AccessReviewSpec {
                resource_attributes: ResourceAttributes {
                    group: self.api_group.clone(),
                    resource: resource.as_str(),
                    verb: verb.as_str(),
                    namespace: tenant.as_str().to_string(),
                },
            },
        }
    }
}

#[async_trait]
impl AccessReviewer for KubernetesAccessReviewer {
    async fn authorize(
        &self,
        credential: Option<&BearerCredential>,
        tenant: &TenantName,
        resource: ApiResource,
        verb: ApiVerb,
    ) -> Result<AccessDecision, AccessReviewError> {
        let Some(credential) = credential else {
            return Err(AccessReviewError::Unauthenticated("missing bearer token".to_string()));
        };
        let url = format!("{}{}", self.api_url, ACCESS_REVIEW_PATH);
        let payload = self.review_payload(tenant, resource, verb);
        let response = self
            .review_client
            .post(url)
            .header(AUTHORIZATION, bearer_header(credential.token())?)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AccessReviewError::Unavailable(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AccessReviewError::Unauthenticated(
                "invalid or expired token".to_string(),
            ));
        }
        if status == StatusCode::FORBIDDEN {
            return Ok(AccessDecision::Denied {
                reason: "insufficient permissions for authorization check".to_string(),
            });
        }
        if !status.is_success() {
            return Err(AccessReviewError::Unavailable(format!(
                "access review error: status {status}"
            )));
        }
        let review: ReviewResponse = response
            .json()
            .await
            .map_err(|err| AccessReviewError::Unavailable(err.to_string()))?;
        if review.status.allowed {
            return Ok(AccessDecision::Allowed);
        }
        let reason = review
            .status
            .reason
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| "no reason provided".to_string());
        Ok(AccessDecision::Denied {
            reason,
        })
    }

    async fn list_all_tenants(&self) -> Vec<TenantName> {
        let Ok(token) = std::fs::read_to_string(&self.service_account_token_path) else {
            return Vec::new();
        };
        let token = token.trim();
        if token.is_empty() {
            return Vec::new();
        }
        let Ok(authorization) = bearer_header(token) else {
            return Vec::new();
        };
        let url = format!("{}{}", self.api_url, NAMESPACE_LIST_PATH);
        let Ok(response) =
            self.enumeration_client.get(url).header(AUTHORIZATION, authorization).send().await
        else {
            return Vec::new();
        };
        if !response.status().is_success() {
            return Vec::new();
        }
        let Ok(list) = response.json::<NamespaceList>().await else {
            return Vec::new();
        };
        let mut tenants: Vec<TenantName> = list
            .items
            .into_iter()
            .filter_map(|item| item.metadata.name)
            .filter_map(|name| TenantName::parse(name).ok())
            .collect();
        sort_tenants(&mut tenants);
        tenants
    }
}

/// Builds a cluster HTTP client with bounded timeouts and TLS settings.
fn build_cluster_client(
    cluster: &ClusterConfig,
    connect_timeout: Duration,
    request_timeout_ms: u64,
) -> Result<Client, AccessReviewError> {
    let mut builder = Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(Duration::from_millis(request_timeout_ms));
    if cluster.insecure_skip_tls_verify {
        builder = builder.danger_accept_invalid_certs(true);
    } else if let Some(path) = resolve_ca_bundle(cluster) {
        let bundle = std::fs::read(&path)
            .map_err(|err| AccessReviewError::Unavailable(format!("ca bundle read: {err}")))?;
        let certificates = Certificate::from_pem_bundle(&bundle)
            .map_err(|err| AccessReviewError::Unavailable(format!("ca bundle parse: {err}")))?;
        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
    }
    builder.build().map_err(|err| AccessReviewError::Unavailable(err.to_string()))
}

/// Resolves the CA bundle to trust for cluster connections.
///
/// An explicit `cluster.ca_bundle_path` takes precedence. Without one, the
/// conventional in-cluster mount is used when the file exists; otherwise
/// platform roots apply.
fn resolve_ca_bundle(cluster: &ClusterConfig) -> Option<PathBuf> {
    if let Some(path) = &cluster.ca_bundle_path {
        return Some(PathBuf::from(path));
    }
    let in_cluster = Path::new(IN_CLUSTER_CA_PATH);
    in_cluster.is_file().then(|| in_cluster.to_path_buf())
}

/// Builds a bearer authorization header value from a raw token.
fn bearer_header(token: &str) -> Result<HeaderValue, AccessReviewError> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| AccessReviewError::Unauthenticated("malformed bearer token".to_string()))
}

// ============================================================================
// SECTION: Wire Payloads
// ============================================================================

/// SelfSubjectAccessReview request object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelfSubjectAccessReview {
    /// Kubernetes API version of the review object.
    api_version: &'static str,
    /// Kubernetes kind of the review object.
    kind: &'static str,
    /// Action attributes placed under review.
    spec: AccessReviewSpec,
}

/// SelfSubjectAccessReview spec body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessReviewSpec {
    /// Resource attributes under review.
    resource_attributes: ResourceAttributes,
}

/// Resource attributes naming the action under review.
#[derive(Debug, Clone, Serialize)]
struct ResourceAttributes {
    /// API group owning the resource.
    group: String,
    /// Resource family label.
    resource: &'static str,
    /// Verb label.
    verb: &'static str,
    /// Tenant namespace under review.
    namespace: String,
}

/// SelfSubjectAccessReview response object.
#[derive(Debug, Deserialize)]
struct ReviewResponse {
    /// Review status reported by the API server.
    #[serde(default)]
    status: ReviewStatus,
}

/// Review status body.
#[derive(Debug, Default, Deserialize)]
struct ReviewStatus {
    /// Whether the action is allowed.
    #[serde(default)]
    allowed: bool,
    /// Reason stated by the authority, when present.
    reason: Option<String>,
}

/// Namespace list response object.
#[derive(Debug, Deserialize)]
struct NamespaceList {
    /// Namespace items.
    #[serde(default)]
    items: Vec<NamespaceItem>,
}

/// One namespace entry in a list response.
#[derive(Debug, Deserialize)]
struct NamespaceItem {
    /// Namespace metadata.
    #[serde(default)]
    metadata: NamespaceMetadata,
}

/// Namespace metadata carrying the name.
#[derive(Debug, Default, Deserialize)]
struct NamespaceMetadata {
    /// Namespace name.
    name: Option<String>,
}

// ============================================================================
// SECTION: Static Reviewer
// ============================================================================

/// In-memory reviewer for tests and local development.
///
/// # Invariants
/// - Decisions are deterministic for identical inputs.
/// - A missing credential is always unauthenticated, even with `allow_all`.
pub struct StaticAccessReviewer {
    /// Token-scoped grant tuples.
    grants: Vec<(String, TenantName, ApiResource, ApiVerb)>,
    /// Tenants reported by enumeration.
    known_tenants: Vec<TenantName>,
    /// When set, any credentialed request is allowed.
    permissive: bool,
}

impl StaticAccessReviewer {
    /// Creates a reviewer with no grants.
    #[must_use]
    pub fn new(known_tenants: Vec<TenantName>) -> Self {
        Self {
            grants: Vec::new(),
            known_tenants,
            permissive: false,
        }
    }

    /// Creates a reviewer that allows every credentialed request.
    #[must_use]
    pub fn allow_all(known_tenants: Vec<TenantName>) -> Self {
        Self {
            grants: Vec::new(),
            known_tenants,
            permissive: true,
        }
    }

    /// Grants one `(tenant, resource, verb)` action to a token.
    pub fn grant(
        &mut self,
        token: impl Into<String>,
        tenant: TenantName,
        resource: ApiResource,
        verb: ApiVerb,
    ) {
        self.grants.push((token.into(), tenant, resource, verb));
    }
}

#[async_trait]
impl AccessReviewer for StaticAccessReviewer {
    async fn authorize(
        &self,
        credential: Option<&BearerCredential>,
        tenant: &TenantName,
        resource: ApiResource,
        verb: ApiVerb,
    ) -> Result<AccessDecision, AccessReviewError> {
        let Some(credential) = credential else {
            return Err(AccessReviewError::Unauthenticated("missing bearer token".to_string()));
        };
        if self.permissive {
            return Ok(AccessDecision::Allowed);
        }
        let granted = self.grants.iter().any(|(token, grant_tenant, grant_resource, grant_verb)| {
            token == credential.token()
                && grant_tenant == tenant
                && *grant_resource == resource
                && *grant_verb == verb
        });
        if granted {
            Ok(AccessDecision::Allowed)
        } else {
            Ok(AccessDecision::Denied {
                reason: format!("no grant for {resource} {verb} in '{tenant}'"),
            })
        }
    }

    async fn list_all_tenants(&self) -> Vec<TenantName> {
        let mut tenants = self.known_tenants.clone();
        sort_tenants(&mut tenants);
        tenants
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
