// crates/tenant-gate-core/src/core/mod.rs
// ============================================================================
// Module: Tenant Gate Core Types
// Description: Tenant identity, naming, classification, and entity model.
// Purpose: Provide the pure building blocks of the isolation layer.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core modules are pure and deterministic: tenant identity validation, the
//! name/tag encodings that confine entities to a tenant, the request
//! classifier, and the entity model of the fronted tracking service. No I/O
//! happens here.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod classify;
pub mod entities;
pub mod naming;
pub mod tenant;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use classify::ApiResource;
pub use classify::ApiVerb;
pub use classify::RequestClass;
pub use classify::classify;
pub use entities::Dataset;
pub use entities::DatasetSummary;
pub use entities::Experiment;
pub use entities::LifecycleStage;
pub use entities::LoggedModel;
pub use entities::Metric;
pub use entities::ModelVersion;
pub use entities::Page;
pub use entities::Param;
pub use entities::Prompt;
pub use entities::RegisteredModel;
pub use entities::Run;
pub use entities::RunStatus;
pub use entities::Tag;
pub use entities::TraceInfo;
pub use entities::ViewType;
pub use entities::Webhook;
pub use entities::tag_value;
pub use naming::NameTransformer;
pub use naming::TENANT_NAME_DELIMITER;
pub use naming::TENANT_TAG_KEY;
pub use naming::append_tenant_filter;
pub use naming::inject_tenant_tag;
pub use naming::is_reserved_tag_key;
pub use naming::rewrite_name_equality;
pub use naming::strip_tenant_tag;
pub use naming::tenant_filter_clause;
pub use naming::tenant_tag;
pub use tenant::MAX_TENANT_NAME_LEN;
pub use tenant::TenantContext;
pub use tenant::TenantName;
pub use tenant::TenantNameError;
