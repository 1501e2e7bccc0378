// crates/tenant-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Stores
// Description: Deterministic in-memory tracking and registry backends.
// Purpose: Provide store implementations for tests, demos, and wiring checks.
// Dependencies: crate::core, crate::interfaces, serde, serde_json
// ============================================================================

//! ## Overview
//! In-memory implementations of [`TrackingStore`] and [`ModelRegistryStore`]
//! for tests and local demos. Both evaluate the conjunctive subset of the
//! filter grammar (`AND`-joined `=` / `!=` clauses over attributes and tags)
//! so that filter-injecting wrappers can be exercised end to end. `order_by`
//! clauses are accepted and ignored; results are returned in key order.
//! Not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::core::entities::Dataset;
use crate::core::entities::DatasetSummary;
use crate::core::entities::Experiment;
use crate::core::entities::LifecycleStage;
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
use crate::core::entities::Webhook;
use crate::core::entities::tag_value;
use crate::interfaces::ModelRegistryStore;
use crate::interfaces::RegistryCapabilities;
use crate::interfaces::SearchQuery;
use crate::interfaces::StoreError;
use crate::interfaces::StoreResult;
use crate::interfaces::TrackingCapabilities;
use crate::interfaces::TrackingStore;

// ============================================================================
// SECTION: Filter Evaluation
// ============================================================================

/// Target of one filter clause.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClauseTarget {
    /// Entity attribute addressed by name.
    Attribute(String),
    /// Entity tag addressed by key.
    Tag(String),
}

/// One parsed conjunct of a filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterClause {
    /// Attribute or tag the clause inspects.
    target: ClauseTarget,
    /// Whether the clause uses `!=` instead of `=`.
    negated: bool,
    /// Quoted comparison value.
    value: String,
}

/// Parses an `AND`-joined conjunction of equality clauses.
///
/// Values containing the literal text ` AND ` are not supported by this
/// evaluator.
fn parse_filter(filter: &str) -> StoreResult<Vec<FilterClause>> {
    let mut clauses = Vec::new();
    for part in filter.split(" AND ") {
        clauses.push(parse_clause(part.trim())?);
    }
    Ok(clauses)
}

/// Parses a single `<target> = '<value>'` or `<target> != '<value>'` clause.
fn parse_clause(clause: &str) -> StoreResult<FilterClause> {
    let (lhs, rhs, negated) = if let Some(index) = clause.find("!=") {
        (&clause[..index], &clause[index + 2..], true)
    } else if let Some(index) = clause.find('=') {
        (&clause[..index], &clause[index + 1..], false)
    } else {
        return Err(StoreError::InvalidParameter(format!("unsupported filter clause: {clause}")));
    };
    let value = rhs
        .trim()
        .strip_prefix('\'')
        .and_then(|quoted| quoted.strip_suffix('\''))
        .ok_or_else(|| {
            StoreError::InvalidParameter(format!("filter value must be single-quoted: {clause}"))
        })?;
    Ok(FilterClause {
        target: parse_target(lhs.trim()),
        negated,
        value: value.to_string(),
    })
}

/// Resolves a clause left-hand side into an attribute or tag target.
fn parse_target(lhs: &str) -> ClauseTarget {
    if let Some(key) = lhs.strip_prefix("tags.") {
        let key = key.strip_prefix('`').and_then(|inner| inner.strip_suffix('`')).unwrap_or(key);
        return ClauseTarget::Tag(key.to_string());
    }
    let key = lhs.strip_prefix("attributes.").unwrap_or(lhs);
    ClauseTarget::Attribute(key.to_string())
}

/// Evaluates parsed clauses against an entity's attributes and tags.
fn clauses_match(
    clauses: &[FilterClause],
    attr: &dyn Fn(&str) -> Option<String>,
    tags: &[Tag],
) -> bool {
    clauses.iter().all(|clause| {
        let actual = match &clause.target {
            ClauseTarget::Attribute(key) => attr(key),
            ClauseTarget::Tag(key) => tag_value(tags, key).map(str::to_string),
        };
        let equal = actual.as_deref() == Some(clause.value.as_str());
        if clause.negated { !equal } else { equal }
    })
}

// ============================================================================
// SECTION: Pagination
// ============================================================================

/// Cursor payload for offset pagination.
#[derive(Debug, Serialize, Deserialize)]
struct PageCursor {
    /// Number of entities already returned.
    offset: usize,
}

/// Slices a sorted result set into one page with a continuation token.
fn paginate<T>(items: Vec<T>, query: &SearchQuery) -> StoreResult<Page<T>> {
    if query.max_results == 0 {
        return Err(StoreError::InvalidParameter(
            "max_results must be greater than zero".to_string(),
        ));
    }
    let offset = match query.page_token.as_deref() {
        Some(token) => {
            let cursor: PageCursor = serde_json::from_str(token)
                .map_err(|_| StoreError::InvalidParameter("invalid page token".to_string()))?;
            cursor.offset
        }
        None => 0,
    };
    let total = items.len();
    let page_items: Vec<T> = items.into_iter().skip(offset).take(query.max_results).collect();
    let consumed = offset.saturating_add(page_items.len());
    let next_page_token = (consumed < total).then(|| {
        serde_json::to_string(&PageCursor {
            offset: consumed,
        })
        .unwrap_or_default()
    });
    Ok(Page {
        items: page_items,
        next_page_token,
    })
}

/// Returns the current wall clock as epoch milliseconds.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: In-Memory Tracking Store
// ============================================================================

/// Mutable state behind the tracking store mutex.
#[derive(Debug, Default)]
struct TrackingState {
    /// Experiments keyed by identifier.
    experiments: BTreeMap<String, Experiment>,
    /// Runs keyed by identifier.
    runs: BTreeMap<String, Run>,
    /// Dataset inputs keyed by run identifier.
    inputs: BTreeMap<String, Vec<Dataset>>,
    /// Traces keyed by request identifier.
    traces: BTreeMap<String, TraceInfo>,
    /// Logged models keyed by model identifier.
    logged_models: BTreeMap<String, LoggedModel>,
    /// Next experiment identifier.
    next_experiment_id: u64,
    /// Next run identifier.
    next_run_id: u64,
    /// Next trace identifier.
    next_trace_id: u64,
    /// Next logged model identifier.
    next_model_id: u64,
}

/// In-memory tracking store for tests and demos.
#[derive(Debug, Clone)]
pub struct InMemoryTrackingStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<TrackingState>>,
    /// Surfaces this instance advertises.
    capabilities: TrackingCapabilities,
}

impl Default for InMemoryTrackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTrackingStore {
    /// Creates a tracking store with every optional surface enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(TrackingCapabilities {
            traces: true,
            logged_models: true,
            datasets: true,
        })
    }

    /// Creates a tracking store advertising exactly the given surfaces.
    #[must_use]
    pub fn with_capabilities(capabilities: TrackingCapabilities) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackingState::default())),
            capabilities,
        }
    }

    /// Locks the state map, surfacing poisoning as a store error.
    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, TrackingState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("tracking store mutex poisoned".to_string()))
    }
}

/// Returns a searchable attribute of an experiment.
fn experiment_attr(experiment: &Experiment, key: &str) -> Option<String> {
    match key {
        "name" => Some(experiment.name.clone()),
        "experiment_id" => Some(experiment.experiment_id.clone()),
        _ => None,
    }
}

/// Returns a searchable attribute of a run.
fn run_attr(run: &Run, key: &str) -> Option<String> {
    match key {
        "run_id" | "run_uuid" => Some(run.run_id.clone()),
        "run_name" => run.run_name.clone(),
        "user_id" => run.user_id.clone(),
        "status" => Some(run.status.as_str().to_string()),
        _ => None,
    }
}

/// Returns a searchable attribute of a trace.
fn trace_attr(trace: &TraceInfo, key: &str) -> Option<String> {
    match key {
        "request_id" => Some(trace.request_id.clone()),
        "status" => trace.status.clone(),
        _ => None,
    }
}

/// Returns a searchable attribute of a logged model.
fn logged_model_attr(model: &LoggedModel, key: &str) -> Option<String> {
    match key {
        "model_id" => Some(model.model_id.clone()),
        "name" => Some(model.name.clone()),
        _ => None,
    }
}

/// Upserts a tag into a tag list, replacing any entry with the same key.
fn upsert_tag(tags: &mut Vec<Tag>, tag: &Tag) {
    if let Some(existing) = tags.iter_mut().find(|candidate| candidate.key == tag.key) {
        existing.value.clone_from(&tag.value);
    } else {
        tags.push(tag.clone());
    }
}

impl TrackingStore for InMemoryTrackingStore {
    fn capabilities(&self) -> TrackingCapabilities {
        self.capabilities
    }

    fn create_experiment(
        &self,
        name: &str,
        artifact_location: Option<&str>,
        tags: &[Tag],
    ) -> StoreResult<Experiment> {
        if name.is_empty() {
            return Err(StoreError::InvalidParameter(
                "experiment name must not be empty".to_string(),
            ));
        }
        let mut guard = self.lock()?;
        if guard.experiments.values().any(|experiment| experiment.name == name) {
            return Err(StoreError::InvalidParameter(format!(
                "experiment name already exists: {name}"
            )));
        }
        guard.next_experiment_id += 1;
        let now = now_millis();
        let experiment = Experiment {
            experiment_id: guard.next_experiment_id.to_string(),
            name: name.to_string(),
            artifact_location: artifact_location.map(str::to_string),
            lifecycle_stage: LifecycleStage::Active,
            tags: tags.to_vec(),
            creation_time: now,
            last_update_time: now,
        };
        guard.experiments.insert(experiment.experiment_id.clone(), experiment.clone());
        drop(guard);
        Ok(experiment)
    }

    fn get_experiment(&self, experiment_id: &str) -> StoreResult<Experiment> {
        self.lock()?
            .experiments
            .get(experiment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("experiment not found: {experiment_id}")))
    }

    fn get_experiment_by_name(&self, name: &str) -> StoreResult<Experiment> {
        self.lock()?
            .experiments
            .values()
            .find(|experiment| experiment.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("experiment not found: {name}")))
    }

    fn rename_experiment(&self, experiment_id: &str, new_name: &str) -> StoreResult<Experiment> {
        let mut guard = self.lock()?;
        let taken = guard.experiments.values().any(|experiment| {
            experiment.name == new_name && experiment.experiment_id != experiment_id
        });
        if taken {
            return Err(StoreError::InvalidParameter(format!(
                "experiment name already exists: {new_name}"
            )));
        }
        let experiment = guard
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| StoreError::NotFound(format!("experiment not found: {experiment_id}")))?;
        experiment.name = new_name.to_string();
        experiment.last_update_time = now_millis();
        Ok(experiment.clone())
    }

    fn delete_experiment(&self, experiment_id: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let experiment = guard
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| StoreError::NotFound(format!("experiment not found: {experiment_id}")))?;
        experiment.lifecycle_stage = LifecycleStage::Deleted;
        experiment.last_update_time = now_millis();
        Ok(())
    }

    fn restore_experiment(&self, experiment_id: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let experiment = guard
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| StoreError::NotFound(format!("experiment not found: {experiment_id}")))?;
        experiment.lifecycle_stage = LifecycleStage::Active;
        experiment.last_update_time = now_millis();
        Ok(())
    }

    fn search_experiments(&self, query: &SearchQuery) -> StoreResult<Page<Experiment>> {
        let clauses = query.filter.as_deref().map(parse_filter).transpose()?.unwrap_or_default();
        let matches: Vec<Experiment> = {
            let guard = self.lock()?;
            guard
                .experiments
                .values()
                .filter(|experiment| query.view_type.admits(experiment.lifecycle_stage))
                .filter(|experiment| {
                    clauses_match(
                        &clauses,
                        &|key| experiment_attr(experiment, key),
                        &experiment.tags,
                    )
                })
                .cloned()
                .collect()
        };
        paginate(matches, query)
    }

    fn set_experiment_tag(&self, experiment_id: &str, tag: &Tag) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let experiment = guard
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| StoreError::NotFound(format!("experiment not found: {experiment_id}")))?;
        upsert_tag(&mut experiment.tags, tag);
        experiment.last_update_time = now_millis();
        Ok(())
    }

    fn delete_experiment_tag(&self, experiment_id: &str, key: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let experiment = guard
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| StoreError::NotFound(format!("experiment not found: {experiment_id}")))?;
        experiment.tags.retain(|tag| tag.key != key);
        experiment.last_update_time = now_millis();
        Ok(())
    }

    fn create_run(
        &self,
        experiment_id: &str,
        user_id: Option<&str>,
        start_time: i64,
        tags: &[Tag],
        run_name: Option<&str>,
    ) -> StoreResult<Run> {
        let mut guard = self.lock()?;
        if !guard.experiments.contains_key(experiment_id) {
            return Err(StoreError::NotFound(format!("experiment not found: {experiment_id}")));
        }
        guard.next_run_id += 1;
        let run = Run {
            run_id: format!("{:032x}", guard.next_run_id),
            experiment_id: experiment_id.to_string(),
            run_name: run_name.map(str::to_string),
            user_id: user_id.map(str::to_string),
            status: RunStatus::Running,
            start_time,
            end_time: None,
            lifecycle_stage: LifecycleStage::Active,
            tags: tags.to_vec(),
            params: Vec::new(),
            metrics: Vec::new(),
        };
        guard.runs.insert(run.run_id.clone(), run.clone());
        drop(guard);
        Ok(run)
    }

    fn get_run(&self, run_id: &str) -> StoreResult<Run> {
        self.lock()?
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))
    }

    fn update_run_info(
        &self,
        run_id: &str,
        status: Option<RunStatus>,
        end_time: Option<i64>,
        run_name: Option<&str>,
    ) -> StoreResult<Run> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        if let Some(status) = status {
            run.status = status;
        }
        if end_time.is_some() {
            run.end_time = end_time;
        }
        if let Some(run_name) = run_name {
            run.run_name = Some(run_name.to_string());
        }
        Ok(run.clone())
    }

    fn delete_run(&self, run_id: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        run.lifecycle_stage = LifecycleStage::Deleted;
        Ok(())
    }

    fn restore_run(&self, run_id: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        run.lifecycle_stage = LifecycleStage::Active;
        Ok(())
    }

    fn set_run_tag(&self, run_id: &str, tag: &Tag) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        upsert_tag(&mut run.tags, tag);
        Ok(())
    }

    fn delete_run_tag(&self, run_id: &str, key: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        run.tags.retain(|tag| tag.key != key);
        Ok(())
    }

    fn log_metric(&self, run_id: &str, metric: &Metric) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        run.metrics.push(metric.clone());
        Ok(())
    }

    fn log_param(&self, run_id: &str, param: &Param) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        log_param_inner(run, param)
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[Tag],
    ) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let run = guard
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run not found: {run_id}")))?;
        for metric in metrics {
            run.metrics.push(metric.clone());
        }
        for param in params {
            log_param_inner(run, param)?;
        }
        for tag in tags {
            upsert_tag(&mut run.tags, tag);
        }
        Ok(())
    }

    fn log_inputs(&self, run_id: &str, datasets: &[Dataset]) -> StoreResult<()> {
        if !self.capabilities.datasets {
            return Err(StoreError::Unsupported("dataset inputs are not supported".to_string()));
        }
        let mut guard = self.lock()?;
        if !guard.runs.contains_key(run_id) {
            return Err(StoreError::NotFound(format!("run not found: {run_id}")));
        }
        guard.inputs.entry(run_id.to_string()).or_default().extend(datasets.iter().cloned());
        Ok(())
    }

    fn search_runs(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<Run>> {
        let clauses = query.filter.as_deref().map(parse_filter).transpose()?.unwrap_or_default();
        let matches: Vec<Run> = {
            let guard = self.lock()?;
            guard
                .runs
                .values()
                .filter(|run| experiment_ids.contains(&run.experiment_id))
                .filter(|run| query.view_type.admits(run.lifecycle_stage))
                .filter(|run| clauses_match(&clauses, &|key| run_attr(run, key), &run.tags))
                .cloned()
                .collect()
        };
        paginate(matches, query)
    }

    fn start_trace(
        &self,
        experiment_id: &str,
        timestamp_ms: i64,
        tags: &[Tag],
    ) -> StoreResult<TraceInfo> {
        if !self.capabilities.traces {
            return Err(StoreError::Unsupported("traces are not supported".to_string()));
        }
        let mut guard = self.lock()?;
        if !guard.experiments.contains_key(experiment_id) {
            return Err(StoreError::NotFound(format!("experiment not found: {experiment_id}")));
        }
        guard.next_trace_id += 1;
        let trace = TraceInfo {
            request_id: format!("tr-{:016x}", guard.next_trace_id),
            experiment_id: experiment_id.to_string(),
            timestamp_ms,
            execution_time_ms: None,
            status: Some("IN_PROGRESS".to_string()),
            tags: tags.to_vec(),
        };
        guard.traces.insert(trace.request_id.clone(), trace.clone());
        drop(guard);
        Ok(trace)
    }

    fn get_trace_info(&self, request_id: &str) -> StoreResult<TraceInfo> {
        if !self.capabilities.traces {
            return Err(StoreError::Unsupported("traces are not supported".to_string()));
        }
        self.lock()?
            .traces
            .get(request_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("trace not found: {request_id}")))
    }

    fn search_traces(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<TraceInfo>> {
        if !self.capabilities.traces {
            return Err(StoreError::Unsupported("traces are not supported".to_string()));
        }
        let clauses = query.filter.as_deref().map(parse_filter).transpose()?.unwrap_or_default();
        let matches: Vec<TraceInfo> = {
            let guard = self.lock()?;
            guard
                .traces
                .values()
                .filter(|trace| experiment_ids.contains(&trace.experiment_id))
                .filter(|trace| clauses_match(&clauses, &|key| trace_attr(trace, key), &trace.tags))
                .cloned()
                .collect()
        };
        paginate(matches, query)
    }

    fn set_trace_tag(&self, request_id: &str, tag: &Tag) -> StoreResult<()> {
        if !self.capabilities.traces {
            return Err(StoreError::Unsupported("traces are not supported".to_string()));
        }
        let mut guard = self.lock()?;
        let trace = guard
            .traces
            .get_mut(request_id)
            .ok_or_else(|| StoreError::NotFound(format!("trace not found: {request_id}")))?;
        upsert_tag(&mut trace.tags, tag);
        Ok(())
    }

    fn delete_trace_tag(&self, request_id: &str, key: &str) -> StoreResult<()> {
        if !self.capabilities.traces {
            return Err(StoreError::Unsupported("traces are not supported".to_string()));
        }
        let mut guard = self.lock()?;
        let trace = guard
            .traces
            .get_mut(request_id)
            .ok_or_else(|| StoreError::NotFound(format!("trace not found: {request_id}")))?;
        trace.tags.retain(|tag| tag.key != key);
        Ok(())
    }

    fn create_logged_model(
        &self,
        experiment_id: &str,
        name: &str,
        tags: &[Tag],
    ) -> StoreResult<LoggedModel> {
        if !self.capabilities.logged_models {
            return Err(StoreError::Unsupported("logged models are not supported".to_string()));
        }
        let mut guard = self.lock()?;
        if !guard.experiments.contains_key(experiment_id) {
            return Err(StoreError::NotFound(format!("experiment not found: {experiment_id}")));
        }
        guard.next_model_id += 1;
        let model = LoggedModel {
            model_id: format!("m-{:016x}", guard.next_model_id),
            experiment_id: experiment_id.to_string(),
            name: name.to_string(),
            tags: tags.to_vec(),
            creation_timestamp: now_millis(),
        };
        guard.logged_models.insert(model.model_id.clone(), model.clone());
        drop(guard);
        Ok(model)
    }

    fn search_logged_models(
        &self,
        experiment_ids: &[String],
        query: &SearchQuery,
    ) -> StoreResult<Page<LoggedModel>> {
        if !self.capabilities.logged_models {
            return Err(StoreError::Unsupported("logged models are not supported".to_string()));
        }
        let clauses = query.filter.as_deref().map(parse_filter).transpose()?.unwrap_or_default();
        let matches: Vec<LoggedModel> = {
            let guard = self.lock()?;
            guard
                .logged_models
                .values()
                .filter(|model| experiment_ids.contains(&model.experiment_id))
                .filter(|model| {
                    clauses_match(&clauses, &|key| logged_model_attr(model, key), &model.tags)
                })
                .cloned()
                .collect()
        };
        paginate(matches, query)
    }

    fn search_datasets(&self, experiment_ids: &[String]) -> StoreResult<Vec<DatasetSummary>> {
        if !self.capabilities.datasets {
            return Err(StoreError::Unsupported("dataset inputs are not supported".to_string()));
        }
        let guard = self.lock()?;
        let mut seen: BTreeSet<(String, String, String)> = BTreeSet::new();
        for (run_id, datasets) in &guard.inputs {
            let Some(run) = guard.runs.get(run_id) else {
                continue;
            };
            if !experiment_ids.contains(&run.experiment_id) {
                continue;
            }
            for dataset in datasets {
                seen.insert((
                    run.experiment_id.clone(),
                    dataset.name.clone(),
                    dataset.digest.clone(),
                ));
            }
        }
        drop(guard);
        Ok(seen
            .into_iter()
            .map(|(experiment_id, name, digest)| DatasetSummary {
                experiment_id,
                name,
                digest,
                context: None,
            })
            .collect())
    }
}

/// Applies one param to a run, rejecting a changed value for an existing key.
fn log_param_inner(run: &mut Run, param: &Param) -> StoreResult<()> {
    if let Some(existing) = run.params.iter().find(|candidate| candidate.key == param.key) {
        if existing.value == param.value {
            return Ok(());
        }
        return Err(StoreError::InvalidParameter(format!(
            "param {} already logged with a different value",
            param.key
        )));
    }
    run.params.push(param.clone());
    Ok(())
}

// ============================================================================
// SECTION: In-Memory Registry Store
// ============================================================================

/// Mutable state behind the registry store mutex.
#[derive(Debug, Default)]
struct RegistryState {
    /// Registered models keyed by stored name.
    models: BTreeMap<String, RegisteredModel>,
    /// Model versions keyed by stored model name, then version number.
    versions: BTreeMap<String, BTreeMap<i64, ModelVersion>>,
    /// Prompts keyed by stored name.
    prompts: BTreeMap<String, Prompt>,
    /// Highest version number ever assigned, per stored model name.
    version_counters: BTreeMap<String, i64>,
    /// Webhook registrations in insertion order.
    webhooks: Vec<Webhook>,
}

/// In-memory model registry store for tests and demos.
#[derive(Debug, Clone)]
pub struct InMemoryRegistryStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<RegistryState>>,
    /// Surfaces this instance advertises.
    capabilities: RegistryCapabilities,
}

impl Default for InMemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistryStore {
    /// Creates a registry store with every optional surface enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(RegistryCapabilities {
            webhooks: true,
        })
    }

    /// Creates a registry store advertising exactly the given surfaces.
    #[must_use]
    pub fn with_capabilities(capabilities: RegistryCapabilities) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            capabilities,
        }
    }

    /// Adds a webhook registration for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsupported`] when webhooks are disabled, or
    /// [`StoreError::Internal`] when the state mutex is poisoned.
    pub fn register_webhook(&self, webhook: Webhook) -> StoreResult<()> {
        if !self.capabilities.webhooks {
            return Err(StoreError::Unsupported("webhooks are not supported".to_string()));
        }
        self.lock()?.webhooks.push(webhook);
        Ok(())
    }

    /// Locks the state map, surfacing poisoning as a store error.
    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, RegistryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("registry store mutex poisoned".to_string()))
    }
}

/// Returns a searchable attribute of a registered model.
fn model_attr(model: &RegisteredModel, key: &str) -> Option<String> {
    match key {
        "name" => Some(model.name.clone()),
        _ => None,
    }
}

/// Returns a searchable attribute of a model version.
fn version_attr(version: &ModelVersion, key: &str) -> Option<String> {
    match key {
        "name" => Some(version.name.clone()),
        "run_id" => version.run_id.clone(),
        "current_stage" => version.current_stage.clone(),
        _ => None,
    }
}

/// Returns a searchable attribute of a prompt.
fn prompt_attr(prompt: &Prompt, key: &str) -> Option<String> {
    match key {
        "name" => Some(prompt.name.clone()),
        _ => None,
    }
}

/// Stage label used when a version carries no explicit stage.
const UNSTAGED_LABEL: &str = "None";

/// Recomputes the highest version per stage for a model's version set.
fn recompute_latest(versions: &BTreeMap<i64, ModelVersion>) -> Vec<ModelVersion> {
    let mut by_stage: BTreeMap<String, ModelVersion> = BTreeMap::new();
    for version in versions.values() {
        let stage = version
            .current_stage
            .clone()
            .unwrap_or_else(|| UNSTAGED_LABEL.to_string())
            .to_ascii_lowercase();
        let replace = by_stage
            .get(&stage)
            .is_none_or(|current| current.version < version.version);
        if replace {
            by_stage.insert(stage, version.clone());
        }
    }
    by_stage.into_values().collect()
}

impl ModelRegistryStore for InMemoryRegistryStore {
    fn capabilities(&self) -> RegistryCapabilities {
        self.capabilities
    }

    fn create_registered_model(
        &self,
        name: &str,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<RegisteredModel> {
        if name.is_empty() {
            return Err(StoreError::InvalidParameter("model name must not be empty".to_string()));
        }
        let mut guard = self.lock()?;
        if guard.models.contains_key(name) {
            return Err(StoreError::InvalidParameter(format!(
                "registered model already exists: {name}"
            )));
        }
        let now = now_millis();
        let model = RegisteredModel {
            name: name.to_string(),
            description: description.map(str::to_string),
            tags: tags.to_vec(),
            creation_timestamp: now,
            last_updated_timestamp: now,
            latest_versions: Vec::new(),
            aliases: BTreeMap::new(),
        };
        guard.models.insert(model.name.clone(), model.clone());
        drop(guard);
        Ok(model)
    }

    fn get_registered_model(&self, name: &str) -> StoreResult<RegisteredModel> {
        self.lock()?
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))
    }

    fn rename_registered_model(&self, name: &str, new_name: &str) -> StoreResult<RegisteredModel> {
        let mut guard = self.lock()?;
        if guard.models.contains_key(new_name) {
            return Err(StoreError::InvalidParameter(format!(
                "registered model already exists: {new_name}"
            )));
        }
        let mut model = guard
            .models
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        model.name = new_name.to_string();
        model.last_updated_timestamp = now_millis();
        if let Some(mut versions) = guard.versions.remove(name) {
            for version in versions.values_mut() {
                version.name = new_name.to_string();
            }
            model.latest_versions = recompute_latest(&versions);
            guard.versions.insert(new_name.to_string(), versions);
        }
        if let Some(counter) = guard.version_counters.remove(name) {
            guard.version_counters.insert(new_name.to_string(), counter);
        }
        guard.models.insert(new_name.to_string(), model.clone());
        drop(guard);
        Ok(model)
    }

    fn update_registered_model(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<RegisteredModel> {
        let mut guard = self.lock()?;
        let model = guard
            .models
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        if let Some(description) = description {
            model.description = Some(description.to_string());
        }
        model.last_updated_timestamp = now_millis();
        Ok(model.clone())
    }

    fn delete_registered_model(&self, name: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        guard
            .models
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        guard.versions.remove(name);
        guard.version_counters.remove(name);
        drop(guard);
        Ok(())
    }

    fn get_latest_versions(&self, name: &str, stages: &[String]) -> StoreResult<Vec<ModelVersion>> {
        let guard = self.lock()?;
        if !guard.models.contains_key(name) {
            return Err(StoreError::NotFound(format!("registered model not found: {name}")));
        }
        let latest = guard.versions.get(name).map(recompute_latest).unwrap_or_default();
        drop(guard);
        if stages.is_empty() {
            return Ok(latest);
        }
        Ok(latest
            .into_iter()
            .filter(|version| {
                let stage = version.current_stage.as_deref().unwrap_or(UNSTAGED_LABEL);
                stages.iter().any(|wanted| wanted.eq_ignore_ascii_case(stage))
            })
            .collect())
    }

    fn search_registered_models(&self, query: &SearchQuery) -> StoreResult<Page<RegisteredModel>> {
        let clauses = query.filter.as_deref().map(parse_filter).transpose()?.unwrap_or_default();
        let matches: Vec<RegisteredModel> = {
            let guard = self.lock()?;
            guard
                .models
                .values()
                .filter(|model| clauses_match(&clauses, &|key| model_attr(model, key), &model.tags))
                .cloned()
                .collect()
        };
        paginate(matches, query)
    }

    fn set_registered_model_tag(&self, name: &str, tag: &Tag) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let model = guard
            .models
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        upsert_tag(&mut model.tags, tag);
        model.last_updated_timestamp = now_millis();
        Ok(())
    }

    fn delete_registered_model_tag(&self, name: &str, key: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let model = guard
            .models
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        model.tags.retain(|tag| tag.key != key);
        model.last_updated_timestamp = now_millis();
        Ok(())
    }

    fn create_model_version(
        &self,
        name: &str,
        source: Option<&str>,
        run_id: Option<&str>,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<ModelVersion> {
        let mut guard = self.lock()?;
        if !guard.models.contains_key(name) {
            return Err(StoreError::NotFound(format!("registered model not found: {name}")));
        }
        // Version numbers stay monotonic even after deletions.
        let next = {
            let counter = guard.version_counters.entry(name.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        let versions = guard.versions.entry(name.to_string()).or_default();
        let now = now_millis();
        let version = ModelVersion {
            name: name.to_string(),
            version: next,
            creation_timestamp: now,
            last_updated_timestamp: now,
            current_stage: Some(UNSTAGED_LABEL.to_string()),
            description: description.map(str::to_string),
            source: source.map(str::to_string),
            run_id: run_id.map(str::to_string),
            tags: tags.to_vec(),
        };
        versions.insert(next, version.clone());
        let latest = recompute_latest(versions);
        if let Some(model) = guard.models.get_mut(name) {
            model.latest_versions = latest;
            model.last_updated_timestamp = now;
        }
        drop(guard);
        Ok(version)
    }

    fn get_model_version(&self, name: &str, version: i64) -> StoreResult<ModelVersion> {
        self.lock()?
            .versions
            .get(name)
            .and_then(|versions| versions.get(&version))
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!("model version not found: {name} version {version}"))
            })
    }

    fn update_model_version(
        &self,
        name: &str,
        version: i64,
        description: Option<&str>,
    ) -> StoreResult<ModelVersion> {
        let mut guard = self.lock()?;
        let entry = guard
            .versions
            .get_mut(name)
            .and_then(|versions| versions.get_mut(&version))
            .ok_or_else(|| {
                StoreError::NotFound(format!("model version not found: {name} version {version}"))
            })?;
        if let Some(description) = description {
            entry.description = Some(description.to_string());
        }
        entry.last_updated_timestamp = now_millis();
        Ok(entry.clone())
    }

    fn transition_model_version_stage(
        &self,
        name: &str,
        version: i64,
        stage: &str,
        archive_existing: bool,
    ) -> StoreResult<ModelVersion> {
        let mut guard = self.lock()?;
        let versions = guard
            .versions
            .get_mut(name)
            .filter(|versions| versions.contains_key(&version))
            .ok_or_else(|| {
                StoreError::NotFound(format!("model version not found: {name} version {version}"))
            })?;
        let now = now_millis();
        if archive_existing {
            for (number, other) in versions.iter_mut() {
                let same_stage = other
                    .current_stage
                    .as_deref()
                    .is_some_and(|current| current.eq_ignore_ascii_case(stage));
                if *number != version && same_stage {
                    other.current_stage = Some("Archived".to_string());
                    other.last_updated_timestamp = now;
                }
            }
        }
        let transitioned = {
            let entry = versions.get_mut(&version).ok_or_else(|| {
                StoreError::NotFound(format!("model version not found: {name} version {version}"))
            })?;
            entry.current_stage = Some(stage.to_string());
            entry.last_updated_timestamp = now;
            entry.clone()
        };
        let latest = recompute_latest(versions);
        if let Some(model) = guard.models.get_mut(name) {
            model.latest_versions = latest;
            model.last_updated_timestamp = now;
        }
        drop(guard);
        Ok(transitioned)
    }

    fn delete_model_version(&self, name: &str, version: i64) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let removed = guard
            .versions
            .get_mut(name)
            .and_then(|versions| versions.remove(&version));
        if removed.is_none() {
            return Err(StoreError::NotFound(format!(
                "model version not found: {name} version {version}"
            )));
        }
        let latest = guard.versions.get(name).map(recompute_latest).unwrap_or_default();
        if let Some(model) = guard.models.get_mut(name) {
            model.latest_versions = latest;
            model.aliases.retain(|_, aliased| *aliased != version);
        }
        drop(guard);
        Ok(())
    }

    fn get_model_version_download_uri(&self, name: &str, version: i64) -> StoreResult<String> {
        let entry = self.get_model_version(name, version)?;
        entry.source.ok_or_else(|| {
            StoreError::InvalidParameter(format!(
                "model version has no source: {name} version {version}"
            ))
        })
    }

    fn search_model_versions(&self, query: &SearchQuery) -> StoreResult<Page<ModelVersion>> {
        let clauses = query.filter.as_deref().map(parse_filter).transpose()?.unwrap_or_default();
        let matches: Vec<ModelVersion> = {
            let guard = self.lock()?;
            guard
                .versions
                .values()
                .flat_map(BTreeMap::values)
                .filter(|version| {
                    clauses_match(&clauses, &|key| version_attr(version, key), &version.tags)
                })
                .cloned()
                .collect()
        };
        paginate(matches, query)
    }

    fn set_model_version_tag(&self, name: &str, version: i64, tag: &Tag) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let entry = guard
            .versions
            .get_mut(name)
            .and_then(|versions| versions.get_mut(&version))
            .ok_or_else(|| {
                StoreError::NotFound(format!("model version not found: {name} version {version}"))
            })?;
        upsert_tag(&mut entry.tags, tag);
        Ok(())
    }

    fn delete_model_version_tag(&self, name: &str, version: i64, key: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let entry = guard
            .versions
            .get_mut(name)
            .and_then(|versions| versions.get_mut(&version))
            .ok_or_else(|| {
                StoreError::NotFound(format!("model version not found: {name} version {version}"))
            })?;
        entry.tags.retain(|tag| tag.key != key);
        Ok(())
    }

    fn set_registered_model_alias(&self, name: &str, alias: &str, version: i64) -> StoreResult<()> {
        let mut guard = self.lock()?;
        if !guard.versions.get(name).is_some_and(|versions| versions.contains_key(&version)) {
            return Err(StoreError::NotFound(format!(
                "model version not found: {name} version {version}"
            )));
        }
        let model = guard
            .models
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        model.aliases.insert(alias.to_string(), version);
        Ok(())
    }

    fn delete_registered_model_alias(&self, name: &str, alias: &str) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let model = guard
            .models
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        model.aliases.remove(alias);
        Ok(())
    }

    fn get_model_version_by_alias(&self, name: &str, alias: &str) -> StoreResult<ModelVersion> {
        let guard = self.lock()?;
        let model = guard
            .models
            .get(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model not found: {name}")))?;
        let version = model.aliases.get(alias).copied().ok_or_else(|| {
            StoreError::NotFound(format!("alias not found: {alias} on model {name}"))
        })?;
        guard
            .versions
            .get(name)
            .and_then(|versions| versions.get(&version))
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!("model version not found: {name} version {version}"))
            })
    }

    fn create_prompt(
        &self,
        name: &str,
        template: Option<&str>,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<Prompt> {
        if name.is_empty() {
            return Err(StoreError::InvalidParameter("prompt name must not be empty".to_string()));
        }
        let mut guard = self.lock()?;
        if guard.prompts.contains_key(name) {
            return Err(StoreError::InvalidParameter(format!("prompt already exists: {name}")));
        }
        let prompt = Prompt {
            name: name.to_string(),
            description: description.map(str::to_string),
            template: template.map(str::to_string),
            tags: tags.to_vec(),
            creation_timestamp: now_millis(),
        };
        guard.prompts.insert(prompt.name.clone(), prompt.clone());
        drop(guard);
        Ok(prompt)
    }

    fn get_prompt(&self, name: &str) -> StoreResult<Prompt> {
        self.lock()?
            .prompts
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("prompt not found: {name}")))
    }

    fn delete_prompt(&self, name: &str) -> StoreResult<()> {
        self.lock()?
            .prompts
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("prompt not found: {name}")))
    }

    fn search_prompts(&self, query: &SearchQuery) -> StoreResult<Page<Prompt>> {
        let clauses = query.filter.as_deref().map(parse_filter).transpose()?.unwrap_or_default();
        let matches: Vec<Prompt> = {
            let guard = self.lock()?;
            guard
                .prompts
                .values()
                .filter(|prompt| {
                    clauses_match(&clauses, &|key| prompt_attr(prompt, key), &prompt.tags)
                })
                .cloned()
                .collect()
        };
        paginate(matches, query)
    }

    fn list_webhooks(&self) -> StoreResult<Vec<Webhook>> {
        if !self.capabilities.webhooks {
            return Err(StoreError::Unsupported("webhooks are not supported".to_string()));
        }
        Ok(self.lock()?.webhooks.clone())
    }
}
