// crates/tenant-gate-core/src/runtime/scoped_tracking.rs
// ============================================================================
// Module: Scoped Tracking Store
// Description: Tenant-confining decorator for the container entity family.
// Purpose: Enforce tag-based isolation on every tracking store operation.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`ScopedTrackingStore`] wraps any [`TrackingStore`] so that every
//! operation is confined to one tenant. Experiments carry the reserved
//! tenant tag; runs, traces, logged models, and datasets inherit isolation
//! by resolving their owning experiment and checking its tag before any read
//! or mutation. Searches inject a conjunctive tenant predicate rather than
//! filtering client-side, so pagination stays query-accurate.
//!
//! Ownership failures follow two distinct shapes: a by-id fetch of a foreign
//! entity is an explicit permission error, while a by-name fetch reports
//! plain absence so foreign names cannot be probed for existence. Optional
//! backend surfaces are resolved once at construction; reads against an
//! absent surface return neutral empty results, and writes that would need
//! to fabricate an entity surface the backend's unsupported error instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::entities::Dataset;
use crate::core::entities::DatasetSummary;
use crate::core::entities::Experiment;
use crate::core::entities::LoggedModel;
use crate::core::entities::Metric;
use crate::core::entities::Page;
use crate::core::entities::Param;
use crate::core::entities::Run;
use crate::core::entities::RunStatus;
use crate::core::entities::Tag;
use crate::core::entities::TraceInfo;
use crate::core::entities::ViewType;
use crate::core::entities::tag_value;
use crate::core::naming::TENANT_TAG_KEY;
use crate::core::naming::append_tenant_filter;
use crate::core::naming::inject_tenant_tag;
use crate::core::naming::is_reserved_tag_key;
use crate::core::naming::strip_tenant_tag;
use crate::core::naming::tenant_filter_clause;
use crate::core::tenant::TenantContext;
use crate::interfaces::DEFAULT_MAX_RESULTS;
use crate::interfaces::SearchQuery;
use crate::interfaces::StoreError;
use crate::interfaces::StoreResult;
use crate::interfaces::TrackingCapabilities;
use crate::interfaces::TrackingStore;

// ============================================================================
// SECTION: Scoped Tracking Store
// ============================================================================

/// Tenant-confining wrapper around a tracking store.
///
/// # Invariants
/// - Capabilities are resolved from the wrapped store once at construction.
/// - Every operation consults the tenant context attached at construction;
///   the wrapper holds no other request state.
#[derive(Clone)]
pub struct ScopedTrackingStore {
    /// Wrapped store receiving confined operations.
    inner: Arc<dyn TrackingStore + Send + Sync>,
    /// Active tenant context for every operation on this wrapper.
    context: TenantContext,
    /// Backend surfaces resolved at construction.
    capabilities: TrackingCapabilities,
}

impl ScopedTrackingStore {
    /// Wraps a tracking store for the given tenant context.
    #[must_use]
    pub fn from_store(
        store: impl TrackingStore + Send + Sync + 'static,
        context: TenantContext,
    ) -> Self {
        Self::new(Arc::new(store), context)
    }

    /// Wraps an existing shared tracking store for the given tenant context.
    #[must_use]
    pub fn new(store: Arc<dyn TrackingStore + Send + Sync>, context: TenantContext) -> Self {
        let capabilities = store.capabilities();
        Self {
            inner: store,
            context,
            capabilities,
        }
    }

    /// Returns the tenant context this wrapper is confined to.
    #[must_use]
    pub const fn context(&self) -> &TenantContext {
        &self.context
    }

    /// Fetches an experiment and verifies the reserved tag matches the
    /// active tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PermissionDenied`] when the experiment belongs
    /// to another tenant or carries no tenant tag.
    fn ensure_owned_experiment(&self, experiment_id: &str) -> StoreResult<Experiment> {
        let experiment = self.inner.get_experiment(experiment_id)?;
        let owner = tag_value(&experiment.tags, TENANT_TAG_KEY);
        if owner != Some(self.context.tenant.as_str()) {
            return Err(StoreError::PermissionDenied(format!(
                "experiment {experiment_id} is not accessible in tenant {}",
                self.context.tenant
            )));
        }
        Ok(experiment)
    }

    /// Fetches a run and verifies its owning experiment's tenant tag.
    fn ensure_owned_run(&self, run_id: &str) -> StoreResult<Run> {
        let run = self.inner.get_run(run_id)?;
        self.ensure_owned_experiment(&run.experiment_id)?;
        Ok(run)
    }

    /// Fetches a trace and verifies its owning experiment's tenant tag.
    fn ensure_owned_trace(&self, request_id: &str) -> StoreResult<TraceInfo> {
        let trace = self.inner.get_trace_info(request_id)?;
        self.ensure_owned_experiment(&trace.experiment_id)?;
        Ok(trace)
    }

    /// Enumerates every experiment id visible to the active tenant.
    ///
    /// Walks all result pages of a tag-filtered search across both lifecycle
    /// stages, so soft-deleted containers still confine their children.
    fn visible_experiment_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query = SearchQuery {
                filter: Some(tenant_filter_clause(&self.context.tenant)),
                view_type: ViewType::All,
                max_results: DEFAULT_MAX_RESULTS,
                order_by: Vec::new(),
                page_token,
            };
            let page = self.inner.search_experiments(&query)?;
            ids.extend(page.items.into_iter().map(|experiment| experiment.experiment_id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(ids)
    }

    /// Intersects requested experiment ids with the tenant's visible set.
    ///
    /// An empty request scopes to the whole visible set; an unrestricted
    /// query is never forwarded to the wrapped store.
    fn scope_experiment_ids(&self, requested: &[String]) -> StoreResult<Vec<String>> {
        let visible = self.visible_experiment_ids()?;
        if requested.is_empty() {
            return Ok(visible);
        }
        Ok(requested.iter().filter(|id| visible.contains(id)).cloned().collect())
    }

    /// Rejects writes addressing the reserved tenant tag key.
    fn reject_reserved_key(key: &str) -> StoreResult<()> {
        if is_reserved_tag_key(key) {
            return Err(StoreError::InvalidParameter(format!(
                "tag key {TENANT_TAG_KEY} is reserved"
            )));
        }
        Ok(())
    }
}

impl TrackingStore for ScopedTrackingStore {
    fn capabilities(&self) -> TrackingCapabilities {
        self.capabilities
    }

    fn create_experiment(
        &self,
        name: &str,
        artifact_location: Option<&str>,
        tags: &[Tag],
    ) -> StoreResult<Experiment> {
        let scoped_tags = inject_tenant_tag(tags, &self.context.tenant);
        self.inner.create_experiment(name, artifact_location, &scoped_tags)
    }

    fn get_experiment(&self, experiment_id: &str) -> StoreResult<Experiment> {
        self.ensure_owned_experiment(experiment_id)
    }

    fn get_experiment_by_name(&self, name: &str) -> StoreResult<Experiment> {
        let experiment = self.inner.get_experiment_by_name(name)?;
        let owner = tag_value(&experiment.tags, TENANT_TAG_KEY);
        if owner != Some(self.context.tenant.as_str()) {
            // Foreign names report plain absence so existence cannot be
            // probed across the tenant boundary.
            return Err(StoreError::NotFound(format!("experiment not found: {name}")));
        }
        Ok(experiment)
    }

    fn rename_experiment(&self, experiment_id: &str, new_name: &str) -> StoreResult<Experiment> {
        self.ensure_owned_experiment(experiment_id)?;
        self.inner.rename_experiment(experiment_id, new_name)
    }

    fn delete_experiment(&self, experiment_id: &str) -> StoreResult<()> {
        self.ensure_owned_experiment(experiment_id)?;
        self.inner.delete_experiment(experiment_id)
    }

    fn restore_experiment(&self, experiment_id: &str) -> StoreResult<()> {
        self.ensure_owned_experiment(experiment_id)?;
        self.inner.restore_experiment(experiment_id)
    }

    fn search_experiments(&self, query: &SearchQuery) -> StoreResult<Page<Experiment>> {
        let scoped = SearchQuery {
            filter: Some(append_tenant_filter(query.filter.as_deref(), &self.context.tenant)),
            ..query.clone()
        };
        self.inner.search_experiments(&scoped)
    }

    fn set_experiment_tag(&self, experiment_id: &str, tag: &Tag) -> StoreResult<()> {
        Self::reject_reserved_key(&tag.key)?;
        self.ensure_owned_experiment(experiment_id)?;
        self.inner.set_experiment_tag(experiment_id, tag)
    }

    fn delete_experiment_tag(&self, experiment_id: &str, key: &str) -> StoreResult<()> {
        Self::reject_reserved_key(key)?;
        self.ensure_owned_experiment(experiment_id)?;
        self.inner.delete_experiment_tag(experiment_id, key)
    }

    fn create_run(
        &self,
        experiment_id: &str,
        user_id: Option<&str>,
        start_time: i64,
        tags: &[Tag],
        run_name: Option<&str>,
    ) -> StoreResult<Run> {
        self.ensure_owned_experiment(experiment_id)?;
        let effective_user = self.context.user.as_deref().or(user_id);
        let scoped_tags = strip_tenant_tag(tags);
        self.inner.create_run(experiment_id, effective_user, start_time, &scoped_tags, run_name)
    }

    fn get_run(&self, run_id: &str) -> StoreResult<Run> {
        self.ensure_owned_run(run_id)
    }

    fn update_run_info(
        &self,
        run_id: &str,
        status: Option<RunStatus>,
        end_time: Option<i64>,
        run_name: Option<&str>,
    ) -> StoreResult<Run> {
        self.ensure_owned_run(run_id)?;
        self.inner.update_run_info(run_id, status, end_time, run_name)
    }

    fn delete_run(&self, run_id: &str) -> StoreResult<()> {
        self.ensure_owned_run(run_id)?;
        self.inner.delete_run(run_id)
    }

    fn restore_run(&self, run_id: &str) -> StoreResult<()> {
        self.ensure_owned_run(run_id)?;
        self.inner.restore_run(run_id)
    }

    fn set_run_tag(&self, run_id: &str, tag: &Tag) -> StoreResult<()> {
        Self::reject_reserved_key(&tag.key)?;
        self.ensure_owned_run(run_id)?;
        self.inner.set_run_tag(run_id, tag)
    }

    fn delete_run_tag(&self, run_id: &str, key: &str) -> StoreResult<()> {
        Self::reject_reserved_key(key)?;
        self.ensure_owned_run(run_id)?;
        self.inner.delete_run_tag(run_id, key)
    }

    fn log_metric(&self, run_id: &str, metric: &Metric) -> StoreResult<()> {
        self.ensure_owned_run(run_id)?;
        self.inner.log_metric(run_id, metric)
    }

    fn log_param(&self, run_id: &str, param: &Param) -> StoreResult<()> {
        self.ensure_owned_run(run_id)?;
        self.inner.log_param(run_id, param)
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[Tag],
    ) -> StoreResult<()> {
        for tag in tags {
            Self::reject_reserved_key(&tag.key)?;
        }
        self.ensure_owned_run(run_id)?;
        self.inner.log_batch(run_id, metrics, params, tags)
    }

    fn log_inputs(&self, run_id: &str, datasets: &[Dataset]) -> StoreResult<()> {
        self.ensure_owned_run(run_id)?;
        if !self.capabilities.datasets {
            return Ok(());
        }
        self.inner.log_inputs(run_id, datasets)
    }

    fn search_runs(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<Run>> {
        let scoped_ids = self.scope_experiment_ids(experiment_ids)?;
        if scoped_ids.is_empty() {
            return Ok(Page::empty());
        }
        self.inner.search_runs(&scoped_ids, query)
    }

    fn start_trace(
        &self,
        experiment_id: &str,
        timestamp_ms: i64,
        tags: &[Tag],
    ) -> StoreResult<TraceInfo> {
        if !self.capabilities.traces {
            return Err(StoreError::Unsupported(
                "traces are not supported by the backing store".to_string(),
            ));
        }
        self.ensure_owned_experiment(experiment_id)?;
        let scoped_tags = strip_tenant_tag(tags);
        self.inner.start_trace(experiment_id, timestamp_ms, &scoped_tags)
    }

    fn get_trace_info(&self, request_id: &str) -> StoreResult<TraceInfo> {
        if !self.capabilities.traces {
            return Err(StoreError::Unsupported(
                "traces are not supported by the backing store".to_string(),
            ));
        }
        self.ensure_owned_trace(request_id)
    }

    fn search_traces(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<TraceInfo>> {
        if !self.capabilities.traces {
            return Ok(Page::empty());
        }
        let scoped_ids = self.scope_experiment_ids(experiment_ids)?;
        if scoped_ids.is_empty() {
            return Ok(Page::empty());
        }
        self.inner.search_traces(&scoped_ids, query)
    }

    fn set_trace_tag(&self, request_id: &str, tag: &Tag) -> StoreResult<()> {
        if !self.capabilities.traces {
            return Ok(());
        }
        Self::reject_reserved_key(&tag.key)?;
        self.ensure_owned_trace(request_id)?;
        self.inner.set_trace_tag(request_id, tag)
    }

    fn delete_trace_tag(&self, request_id: &str, key: &str) -> StoreResult<()> {
        if !self.capabilities.traces {
            return Ok(());
        }
        Self::reject_reserved_key(key)?;
        self.ensure_owned_trace(request_id)?;
        self.inner.delete_trace_tag(request_id, key)
    }

    fn create_logged_model(
        &self,
        experiment_id: &str,
        name: &str,
        tags: &[Tag],
    ) -> StoreResult<LoggedModel> {
        if !self.capabilities.logged_models {
            return Err(StoreError::Unsupported(
                "logged models are not supported by the backing store".to_string(),
            ));
        }
        self.ensure_owned_experiment(experiment_id)?;
        let scoped_tags = strip_tenant_tag(tags);
        self.inner.create_logged_model(experiment_id, name, &scoped_tags)
    }

    fn search_logged_models(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<LoggedModel>> {
        if !self.capabilities.logged_models {
            return Ok(Page::empty());
        }
        let scoped_ids = self.scope_experiment_ids(experiment_ids)?;
        if scoped_ids.is_empty() {
            return Ok(Page::empty());
        }
        self.inner.search_logged_models(&scoped_ids, query)
    }

    fn search_datasets(&self, experiment_ids: &[String]) -> StoreResult<Vec<DatasetSummary>> {
        if !self.capabilities.datasets {
            return Ok(Vec::new());
        }
        let scoped_ids = self.scope_experiment_ids(experiment_ids)?;
        if scoped_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.inner.search_datasets(&scoped_ids)
    }
}
