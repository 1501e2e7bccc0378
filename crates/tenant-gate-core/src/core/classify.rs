// crates/tenant-gate-core/src/core/classify.rs
// ============================================================================
// Module: Request Classification
// Description: Map request path and method onto an authorization tuple.
// Purpose: Derive the (resource, verb) pair checked against the authority.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The tracking API does not declare resource/verb metadata per route, so the
//! classifier derives the authorization tuple from path substrings and the
//! HTTP method. Classification is total: unrecognized requests fall back to
//! the most restrictive-read pair (`experiments`, `get`) and still go through
//! the delegated permission check.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Authorization Tuple Types
// ============================================================================

/// Resource families recognized by the access-control authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiResource {
    /// Experiments and their child runs, traces, logged models, datasets.
    Experiments,
    /// Registered models and model versions.
    Models,
    /// Prompts and prompt versions.
    Prompts,
}

impl ApiResource {
    /// All resource families, in probe order.
    pub const ALL: [Self; 3] = [Self::Experiments, Self::Models, Self::Prompts];

    /// Returns the wire label used in access-review requests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Experiments => "experiments",
            Self::Models => "models",
            Self::Prompts => "prompts",
        }
    }
}

impl fmt::Display for ApiResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verbs recognized by the access-control authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiVerb {
    /// Read a single entity.
    Get,
    /// Enumerate or search entities.
    List,
    /// Create a new entity.
    Create,
    /// Mutate an existing entity.
    Update,
    /// Delete or archive an entity.
    Delete,
}

impl ApiVerb {
    /// Returns the wire label used in access-review requests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ApiVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified authorization tuple for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestClass {
    /// Resource family the request touches.
    pub resource: ApiResource,
    /// Verb the request performs.
    pub verb: ApiVerb,
}

// ============================================================================
// SECTION: Classifier
// ============================================================================

/// Classifies a request into its authorization tuple.
///
/// Matching is case-insensitive and substring-based over the path. Routes
/// added to the fronted service after this table was written may classify
/// into an unintended pair; the delegated permission check still runs, but
/// possibly against the wrong tuple, so new route families warrant a review
/// of these rules.
#[must_use]
pub fn classify(method: &str, path: &str) -> RequestClass {
    let path = path.to_ascii_lowercase();
    let resource = classify_resource(&path);
    let verb = classify_verb(method, &path);
    RequestClass {
        resource,
        verb,
    }
}

/// Derives the resource family from the lower-cased path.
fn classify_resource(path: &str) -> ApiResource {
    if path.contains("registered-model") || path.contains("model-version") {
        ApiResource::Models
    } else if path.contains("prompt") {
        ApiResource::Prompts
    } else {
        ApiResource::Experiments
    }
}

/// Derives the verb from the method and lower-cased path.
fn classify_verb(method: &str, path: &str) -> ApiVerb {
    match method.to_ascii_uppercase().as_str() {
        "GET" => {
            if path.contains("search") {
                ApiVerb::List
            } else {
                ApiVerb::Get
            }
        }
        method @ ("POST" | "PUT" | "PATCH" | "DELETE") => {
            if path.contains("delete") || method == "DELETE" {
                ApiVerb::Delete
            } else if path.contains("create") {
                ApiVerb::Create
            } else if path.contains("update") || method == "PUT" || method == "PATCH" {
                ApiVerb::Update
            } else {
                ApiVerb::Create
            }
        }
        _ => ApiVerb::Get,
    }
}
