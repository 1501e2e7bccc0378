// crates/tenant-gate-core/src/core/entities.rs
// ============================================================================
// Module: Tracking Entities
// Description: Serializable entity model for the fronted tracking service.
// Purpose: Provide the typed shapes the isolation layer reads and rewrites.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Entity shapes mirror the fronted tracking API: experiments own runs,
//! traces, logged models, and datasets (the container family, isolated by the
//! reserved tenant tag), while registered models and prompts are globally
//! unique by name (the named-singleton family, isolated by a name prefix).
//! Timestamps are epoch milliseconds as carried on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Common Value Types
// ============================================================================

/// Key-value tag attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Creates a tag from key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Returns the value of the first tag with the given key, if present.
#[must_use]
pub fn tag_value<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter().find(|tag| tag.key == key).map(|tag| tag.value.as_str())
}

/// Logged metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric key.
    pub key: String,
    /// Sampled value.
    pub value: f64,
    /// Sample timestamp (epoch milliseconds).
    pub timestamp: i64,
    /// Training step the sample belongs to.
    pub step: i64,
}

/// Logged parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: String,
}

/// Soft-deletion state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// Entity is live.
    #[default]
    Active,
    /// Entity is soft-deleted and hidden from active views.
    Deleted,
}

/// View filter over lifecycle stages for search operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    /// Only active entities.
    #[default]
    ActiveOnly,
    /// Only soft-deleted entities.
    DeletedOnly,
    /// Both active and soft-deleted entities.
    All,
}

impl ViewType {
    /// Returns whether a lifecycle stage is visible under this view.
    #[must_use]
    pub const fn admits(self, stage: LifecycleStage) -> bool {
        match self {
            Self::ActiveOnly => matches!(stage, LifecycleStage::Active),
            Self::DeletedOnly => matches!(stage, LifecycleStage::Deleted),
            Self::All => true,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Entities on this page.
    pub items: Vec<T>,
    /// Opaque continuation token, absent on the final page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// Returns an empty final page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: None,
        }
    }
}

// ============================================================================
// SECTION: Container Family
// ============================================================================

/// Top-level experiment container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Store-assigned experiment identifier.
    pub experiment_id: String,
    /// Experiment name, unique within the store.
    pub name: String,
    /// Root location for run artifacts, when configured.
    pub artifact_location: Option<String>,
    /// Soft-deletion state.
    pub lifecycle_stage: LifecycleStage,
    /// Experiment tags, including the reserved tenant tag.
    pub tags: Vec<Tag>,
    /// Creation timestamp (epoch milliseconds).
    pub creation_time: i64,
    /// Last update timestamp (epoch milliseconds).
    pub last_update_time: i64,
}

/// Terminal and in-flight run states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is executing.
    #[default]
    Running,
    /// Run is queued and has not started.
    Scheduled,
    /// Run completed successfully.
    Finished,
    /// Run terminated with an error.
    Failed,
    /// Run was killed before completion.
    Killed,
}

impl RunStatus {
    /// Returns the wire label for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Scheduled => "SCHEDULED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }
}

/// Tracked run owned by an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Store-assigned run identifier.
    pub run_id: String,
    /// Owning experiment identifier.
    pub experiment_id: String,
    /// Optional display name.
    pub run_name: Option<String>,
    /// User recorded at creation, when resolved.
    pub user_id: Option<String>,
    /// Current run status.
    pub status: RunStatus,
    /// Start timestamp (epoch milliseconds).
    pub start_time: i64,
    /// End timestamp (epoch milliseconds), absent while running.
    pub end_time: Option<i64>,
    /// Soft-deletion state.
    pub lifecycle_stage: LifecycleStage,
    /// Run tags.
    pub tags: Vec<Tag>,
    /// Logged parameters.
    pub params: Vec<Param>,
    /// Logged metric samples.
    pub metrics: Vec<Metric>,
}

/// Dataset reference logged as a run input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset name.
    pub name: String,
    /// Content digest distinguishing dataset variants.
    pub digest: String,
    /// Source type label (for example `delta` or `http`).
    pub source_type: String,
    /// Source locator.
    pub source: String,
}

/// Dataset usage summary returned by dataset search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Experiment the dataset was logged under.
    pub experiment_id: String,
    /// Dataset name.
    pub name: String,
    /// Content digest.
    pub digest: String,
    /// Usage context recorded at logging time, when present.
    pub context: Option<String>,
}

/// Trace metadata owned by an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceInfo {
    /// Store-assigned trace request identifier.
    pub request_id: String,
    /// Owning experiment identifier.
    pub experiment_id: String,
    /// Trace start timestamp (epoch milliseconds).
    pub timestamp_ms: i64,
    /// Trace duration in milliseconds, when completed.
    pub execution_time_ms: Option<i64>,
    /// Trace status label.
    pub status: Option<String>,
    /// Trace tags.
    pub tags: Vec<Tag>,
}

/// Model artifact logged under an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedModel {
    /// Store-assigned model identifier.
    pub model_id: String,
    /// Owning experiment identifier.
    pub experiment_id: String,
    /// Model name.
    pub name: String,
    /// Model tags.
    pub tags: Vec<Tag>,
    /// Creation timestamp (epoch milliseconds).
    pub creation_timestamp: i64,
}

// ============================================================================
// SECTION: Named-Singleton Family
// ============================================================================

/// Registered model addressed by globally unique name.
///
/// # Invariants
/// - The stored `name` carries the tenant prefix; the visible form is
///   produced by the scoping layer on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    /// Stored model name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Model tags, including the reserved tenant tag.
    pub tags: Vec<Tag>,
    /// Creation timestamp (epoch milliseconds).
    pub creation_timestamp: i64,
    /// Last update timestamp (epoch milliseconds).
    pub last_updated_timestamp: i64,
    /// Latest version per stage.
    pub latest_versions: Vec<ModelVersion>,
    /// Alias name to version number mapping.
    pub aliases: BTreeMap<String, i64>,
}

/// Version of a registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Stored parent model name.
    pub name: String,
    /// Version number, 1-based per model.
    pub version: i64,
    /// Creation timestamp (epoch milliseconds).
    pub creation_timestamp: i64,
    /// Last update timestamp (epoch milliseconds).
    pub last_updated_timestamp: i64,
    /// Deployment stage label.
    pub current_stage: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Artifact source location.
    pub source: Option<String>,
    /// Run that produced the version, when known.
    pub run_id: Option<String>,
    /// Version tags.
    pub tags: Vec<Tag>,
}

/// Prompt addressed by globally unique name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Stored prompt name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Prompt template text.
    pub template: Option<String>,
    /// Prompt tags, including the reserved tenant tag.
    pub tags: Vec<Tag>,
    /// Creation timestamp (epoch milliseconds).
    pub creation_timestamp: i64,
}

/// Registry webhook registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    /// Webhook name.
    pub name: String,
    /// Delivery endpoint.
    pub url: String,
    /// Event labels the webhook subscribes to.
    pub events: Vec<String>,
}
