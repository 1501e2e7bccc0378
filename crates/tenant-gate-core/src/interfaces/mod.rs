// crates/tenant-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Tenant Gate Interfaces
// Description: Backend-agnostic store contracts for tracking and registry.
// Purpose: Define the surfaces the tenant-scoping layer wraps and implements.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Two store contracts cover the fronted service: [`TrackingStore`] for the
//! container family (experiments, runs, traces, logged models, datasets) and
//! [`ModelRegistryStore`] for the named-singleton family (registered models,
//! prompts, webhooks). Backends advertise optional surfaces through
//! capability structs resolved once at wrapper construction. All operations
//! fail closed: a store that cannot answer returns an error rather than
//! guessing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::entities::Dataset;
use crate::core::entities::DatasetSummary;
use crate::core::entities::Experiment;
use crate::core::entities::LoggedModel;
use crate::core::entities::Metric;
use crate::core::entities::ModelVersion;
use crate::core::entities::Page;
use crate::core::entities::Param;
use crate::core::entities::Prompt;
use crate::core::entities::RegisteredModel;
use crate::core::entities::Run;
use crate::core::entities::RunStatus;
use crate::core::entities::Tag;
use crate::core::entities::TraceInfo;
use crate::core::entities::ViewType;
use crate::core::entities::Webhook;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed entity does not exist in the caller's view.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// The caller may not act on the addressed entity.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// A request parameter is malformed or out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The backend does not support the requested surface.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// The backend failed internally.
    #[error("store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns the protocol error code carried on the wire for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "RESOURCE_DOES_NOT_EXIST",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::InvalidParameter(_) => "INVALID_PARAMETER_VALUE",
            Self::Unsupported(_) => "FEATURE_DISABLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// SECTION: Capabilities
// ============================================================================

/// Optional tracking surfaces a backend advertises.
///
/// # Invariants
/// - Resolved once when a scoping wrapper is constructed; per-call probing
///   is not permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackingCapabilities {
    /// Backend stores trace metadata.
    pub traces: bool,
    /// Backend stores logged models.
    pub logged_models: bool,
    /// Backend records dataset inputs.
    pub datasets: bool,
}

/// Optional registry surfaces a backend advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryCapabilities {
    /// Backend manages webhook registrations.
    pub webhooks: bool,
}

// ============================================================================
// SECTION: Search Query
// ============================================================================

/// Default page size for search operations.
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// Parameters shared by all search operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Filter expression in the fronted service's filter grammar.
    pub filter: Option<String>,
    /// Lifecycle view the search runs under.
    pub view_type: ViewType,
    /// Maximum entities per page.
    pub max_results: usize,
    /// Ordering clauses, applied in sequence.
    pub order_by: Vec<String>,
    /// Continuation token from a previous page.
    pub page_token: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            filter: None,
            view_type: ViewType::default(),
            max_results: DEFAULT_MAX_RESULTS,
            order_by: Vec::new(),
            page_token: None,
        }
    }
}

impl SearchQuery {
    /// Returns a query matching everything under the active view.
    #[must_use]
    pub fn unfiltered() -> Self {
        Self::default()
    }

    /// Returns a query with the given filter expression.
    #[must_use]
    pub fn filtered(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Tracking Store
// ============================================================================

/// Store contract for the experiment container family.
pub trait TrackingStore {
    /// Returns the optional surfaces this backend supports.
    fn capabilities(&self) -> TrackingCapabilities;

    /// Creates an experiment with the given name, location, and tags.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] when the name is already
    /// taken, or [`StoreError::Internal`] on backend failure.
    fn create_experiment(
        &self,
        name: &str,
        artifact_location: Option<&str>,
        tags: &[Tag],
    ) -> StoreResult<Experiment>;

    /// Fetches an experiment by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such experiment exists.
    fn get_experiment(&self, experiment_id: &str) -> StoreResult<Experiment>;

    /// Fetches an experiment by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such experiment exists.
    fn get_experiment_by_name(&self, name: &str) -> StoreResult<Experiment>;

    /// Renames an experiment and returns the updated entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such experiment exists, or
    /// [`StoreError::InvalidParameter`] when the new name is taken.
    fn rename_experiment(&self, experiment_id: &str, new_name: &str) -> StoreResult<Experiment>;

    /// Soft-deletes an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such experiment exists.
    fn delete_experiment(&self, experiment_id: &str) -> StoreResult<()>;

    /// Restores a soft-deleted experiment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such experiment exists.
    fn restore_experiment(&self, experiment_id: &str) -> StoreResult<()>;

    /// Searches experiments under the query's view and filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] on a malformed query.
    fn search_experiments(&self, query: &SearchQuery) -> StoreResult<Page<Experiment>>;

    /// Sets or replaces an experiment tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such experiment exists.
    fn set_experiment_tag(&self, experiment_id: &str, tag: &Tag) -> StoreResult<()>;

    /// Deletes an experiment tag by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such experiment exists.
    fn delete_experiment_tag(&self, experiment_id: &str, key: &str) -> StoreResult<()>;

    /// Creates a run under an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the experiment does not exist.
    fn create_run(
        &self,
        experiment_id: &str,
        user_id: Option<&str>,
        start_time: i64,
        tags: &[Tag],
        run_name: Option<&str>,
    ) -> StoreResult<Run>;

    /// Fetches a run by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn get_run(&self, run_id: &str) -> StoreResult<Run>;

    /// Updates run status, end time, or name, returning the updated run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn update_run_info(
        &self,
        run_id: &str,
        status: Option<RunStatus>,
        end_time: Option<i64>,
        run_name: Option<&str>,
    ) -> StoreResult<Run>;

    /// Soft-deletes a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn delete_run(&self, run_id: &str) -> StoreResult<()>;

    /// Restores a soft-deleted run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn restore_run(&self, run_id: &str) -> StoreResult<()>;

    /// Sets or replaces a run tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn set_run_tag(&self, run_id: &str, tag: &Tag) -> StoreResult<()>;

    /// Deletes a run tag by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn delete_run_tag(&self, run_id: &str, key: &str) -> StoreResult<()>;

    /// Logs one metric sample against a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn log_metric(&self, run_id: &str, metric: &Metric) -> StoreResult<()>;

    /// Logs one parameter against a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn log_param(&self, run_id: &str, param: &Param) -> StoreResult<()>;

    /// Logs metrics, params, and tags against a run in one call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists.
    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[Tag],
    ) -> StoreResult<()>;

    /// Records dataset inputs against a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such run exists, or
    /// [`StoreError::Unsupported`] when the backend lacks dataset support.
    fn log_inputs(&self, run_id: &str, datasets: &[Dataset]) -> StoreResult<()>;

    /// Searches runs across the given experiments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] on a malformed query.
    fn search_runs(&self, experiment_ids: &[String], query: &SearchQuery) -> StoreResult<Page<Run>>;

    /// Opens a trace under an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the experiment does not exist,
    /// or [`StoreError::Unsupported`] when the backend lacks trace support.
    fn start_trace(
        &self,
        experiment_id: &str,
        timestamp_ms: i64,
        tags: &[Tag],
    ) -> StoreResult<TraceInfo>;

    /// Fetches trace metadata by request identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such trace exists.
    fn get_trace_info(&self, request_id: &str) -> StoreResult<TraceInfo>;

    /// Searches traces across the given experiments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsupported`] when the backend lacks trace
    /// support, or [`StoreError::InvalidParameter`] on a malformed query.
    fn search_traces(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<TraceInfo>>;

    /// Sets or replaces a trace tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such trace exists.
    fn set_trace_tag(&self, request_id: &str, tag: &Tag) -> StoreResult<()>;

    /// Deletes a trace tag by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such trace exists.
    fn delete_trace_tag(&self, request_id: &str, key: &str) -> StoreResult<()>;

    /// Creates a logged model under an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the experiment does not exist,
    /// or [`StoreError::Unsupported`] when the backend lacks model logging.
    fn create_logged_model(
        &self,
        experiment_id: &str,
        name: &str,
        tags: &[Tag],
    ) -> StoreResult<LoggedModel>;

    /// Searches logged models across the given experiments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsupported`] when the backend lacks model
    /// logging, or [`StoreError::InvalidParameter`] on a malformed query.
    fn search_logged_models(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<LoggedModel>>;

    /// Summarizes datasets logged across the given experiments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsupported`] when the backend lacks dataset
    /// support.
    fn search_datasets(&self, experiment_ids: &[String]) -> StoreResult<Vec<DatasetSummary>>;
}

// ============================================================================
// SECTION: Model Registry Store
// ============================================================================

/// Store contract for the named-singleton family.
pub trait ModelRegistryStore {
    /// Returns the optional surfaces this backend supports.
    fn capabilities(&self) -> RegistryCapabilities;

    /// Creates a registered model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] when the name is taken.
    fn create_registered_model(
        &self,
        name: &str,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<RegisteredModel>;

    /// Fetches a registered model by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn get_registered_model(&self, name: &str) -> StoreResult<RegisteredModel>;

    /// Renames a registered model and returns the updated entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists, or
    /// [`StoreError::InvalidParameter`] when the new name is taken.
    fn rename_registered_model(&self, name: &str, new_name: &str) -> StoreResult<RegisteredModel>;

    /// Updates a registered model's description.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn update_registered_model(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<RegisteredModel>;

    /// Deletes a registered model and all of its versions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn delete_registered_model(&self, name: &str) -> StoreResult<()>;

    /// Returns the latest version per requested stage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn get_latest_versions(&self, name: &str, stages: &[String]) -> StoreResult<Vec<ModelVersion>>;

    /// Searches registered models under the query's filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] on a malformed query.
    fn search_registered_models(&self, query: &SearchQuery) -> StoreResult<Page<RegisteredModel>>;

    /// Sets or replaces a registered model tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn set_registered_model_tag(&self, name: &str, tag: &Tag) -> StoreResult<()>;

    /// Deletes a registered model tag by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn delete_registered_model_tag(&self, name: &str, key: &str) -> StoreResult<()>;

    /// Creates a new version under a registered model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn create_model_version(
        &self,
        name: &str,
        source: Option<&str>,
        run_id: Option<&str>,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<ModelVersion>;

    /// Fetches a model version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn get_model_version(&self, name: &str, version: i64) -> StoreResult<ModelVersion>;

    /// Updates a model version's description.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn update_model_version(
        &self,
        name: &str,
        version: i64,
        description: Option<&str>,
    ) -> StoreResult<ModelVersion>;

    /// Moves a model version to a new stage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn transition_model_version_stage(
        &self,
        name: &str,
        version: i64,
        stage: &str,
        archive_existing: bool,
    ) -> StoreResult<ModelVersion>;

    /// Deletes a model version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn delete_model_version(&self, name: &str, version: i64) -> StoreResult<()>;

    /// Returns the artifact download location for a model version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn get_model_version_download_uri(&self, name: &str, version: i64) -> StoreResult<String>;

    /// Searches model versions under the query's filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] on a malformed query.
    fn search_model_versions(&self, query: &SearchQuery) -> StoreResult<Page<ModelVersion>>;

    /// Sets or replaces a model version tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn set_model_version_tag(&self, name: &str, version: i64, tag: &Tag) -> StoreResult<()>;

    /// Deletes a model version tag by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn delete_model_version_tag(&self, name: &str, version: i64, key: &str) -> StoreResult<()>;

    /// Points an alias at a model version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such version exists.
    fn set_registered_model_alias(&self, name: &str, alias: &str, version: i64) -> StoreResult<()>;

    /// Removes an alias from a registered model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such model exists.
    fn delete_registered_model_alias(&self, name: &str, alias: &str) -> StoreResult<()>;

    /// Resolves an alias to its model version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such alias exists.
    fn get_model_version_by_alias(&self, name: &str, alias: &str) -> StoreResult<ModelVersion>;

    /// Creates a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] when the name is taken.
    fn create_prompt(
        &self,
        name: &str,
        template: Option<&str>,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<Prompt>;

    /// Fetches a prompt by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such prompt exists.
    fn get_prompt(&self, name: &str) -> StoreResult<Prompt>;

    /// Deletes a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such prompt exists.
    fn delete_prompt(&self, name: &str) -> StoreResult<()>;

    /// Searches prompts under the query's filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidParameter`] on a malformed query.
    fn search_prompts(&self, query: &SearchQuery) -> StoreResult<Page<Prompt>>;

    /// Lists webhook registrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsupported`] when the backend lacks webhook
    /// support.
    fn list_webhooks(&self) -> StoreResult<Vec<Webhook>>;
}
