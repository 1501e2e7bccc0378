// crates/tenant-gate-core/tests/scoped_tracking.rs
// ============================================================================
// Module: Scoped Tracking Store Tests
// Description: Tests for tenant confinement over the container family.
// Purpose: Verify tag injection, transitive checks, and search scoping.
// Dependencies: tenant-gate-core
// ============================================================================

//! ## Overview
//! Exercises the tenant-scoping decorator over a shared in-memory tracking
//! store: reserved-tag injection at creation, by-id versus by-name denial
//! semantics, transitive ownership checks on runs and traces, visible-set
//! intersection for cross-container searches, and neutral handling of
//! backend capabilities resolved at construction.
//!
//! Security posture: These tests drive two tenants against one backend and
//! assert neither can observe or mutate the other's entities.
//! Threat model: TM-SCOPE-001 - Cross-tenant reads or writes through the
//! decorated store.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use tenant_gate_core::Dataset;
use tenant_gate_core::InMemoryTrackingStore;
use tenant_gate_core::Metric;
use tenant_gate_core::Param;
use tenant_gate_core::RunStatus;
use tenant_gate_core::ScopedTrackingStore;
use tenant_gate_core::SearchQuery;
use tenant_gate_core::StoreError;
use tenant_gate_core::TENANT_TAG_KEY;
use tenant_gate_core::Tag;
use tenant_gate_core::TenantContext;
use tenant_gate_core::TenantName;
use tenant_gate_core::TrackingCapabilities;
use tenant_gate_core::TrackingStore;
use tenant_gate_core::tag_value;

/// Builds a tenant context for the given tenant name.
fn ctx(tenant: &str) -> TenantContext {
    TenantContext::new(TenantName::parse(tenant).expect("valid tenant"))
}

/// Builds two tenant views over one shared backend.
fn two_tenants() -> (Arc<InMemoryTrackingStore>, ScopedTrackingStore, ScopedTrackingStore) {
    let backend = Arc::new(InMemoryTrackingStore::new());
    let scoped_a = ScopedTrackingStore::new(backend.clone(), ctx("team-a"));
    let scoped_b = ScopedTrackingStore::new(backend.clone(), ctx("team-b"));
    (backend, scoped_a, scoped_b)
}

/// Verifies creation records the reserved tenant tag alongside caller tags.
#[test]
fn create_experiment_injects_tenant_tag() {
    let (backend, scoped_a, _) = two_tenants();
    let experiment = scoped_a
        .create_experiment("exp", None, &[Tag::new("purpose", "demo")])
        .expect("create experiment");
    assert_eq!(tag_value(&experiment.tags, TENANT_TAG_KEY), Some("team-a"));
    assert_eq!(tag_value(&experiment.tags, "purpose"), Some("demo"));
    let stored = backend.get_experiment(&experiment.experiment_id).expect("stored experiment");
    assert_eq!(tag_value(&stored.tags, TENANT_TAG_KEY), Some("team-a"));
}

/// Verifies a caller-supplied reserved tag cannot reassign ownership.
#[test]
fn create_experiment_overrides_spoofed_tenant_tag() {
    let (backend, scoped_a, _) = two_tenants();
    let experiment = scoped_a
        .create_experiment("exp", None, &[Tag::new(TENANT_TAG_KEY, "team-b")])
        .expect("create experiment");
    let stored = backend.get_experiment(&experiment.experiment_id).expect("stored experiment");
    let reserved: Vec<&Tag> =
        stored.tags.iter().filter(|tag| tag.key == TENANT_TAG_KEY).collect();
    assert_eq!(reserved.len(), 1);
    assert_eq!(reserved[0].value, "team-a");
}

/// Verifies a foreign experiment id is denied explicitly.
#[test]
fn get_experiment_denies_foreign_id() {
    let (_, scoped_a, scoped_b) = two_tenants();
    let foreign = scoped_b.create_experiment("b-exp", None, &[]).expect("create experiment");
    let err = scoped_a.get_experiment(&foreign.experiment_id).expect_err("foreign id");
    assert!(matches!(err, StoreError::PermissionDenied(_)));
    let own = scoped_a.create_experiment("a-exp", None, &[]).expect("create experiment");
    assert!(scoped_a.get_experiment(&own.experiment_id).is_ok());
}

/// Verifies a foreign experiment name reads as plain absence.
#[test]
fn get_experiment_by_name_hides_foreign_names() {
    let (_, scoped_a, scoped_b) = two_tenants();
    scoped_b.create_experiment("b-exp", None, &[]).expect("create experiment");
    let err = scoped_a.get_experiment_by_name("b-exp").expect_err("foreign name");
    assert!(matches!(err, StoreError::NotFound(_)));
    let own = scoped_a.create_experiment("a-exp", None, &[]).expect("create experiment");
    let fetched = scoped_a.get_experiment_by_name("a-exp").expect("own name");
    assert_eq!(fetched.experiment_id, own.experiment_id);
}

/// Verifies an untagged experiment is foreign to every tenant view.
#[test]
fn untagged_experiments_are_inaccessible() {
    let (backend, scoped_a, _) = two_tenants();
    let orphan = backend.create_experiment("orphan", None, &[]).expect("create experiment");
    let err = scoped_a.get_experiment(&orphan.experiment_id).expect_err("untagged id");
    assert!(matches!(err, StoreError::PermissionDenied(_)));
    let err = scoped_a.get_experiment_by_name("orphan").expect_err("untagged name");
    assert!(matches!(err, StoreError::NotFound(_)));
}

/// Verifies experiment search is confined and conjoins caller filters.
#[test]
fn search_experiments_scopes_and_conjoins() {
    let (_, scoped_a, scoped_b) = two_tenants();
    scoped_a.create_experiment("alpha", None, &[]).expect("create experiment");
    scoped_a.create_experiment("beta", None, &[]).expect("create experiment");
    scoped_b.create_experiment("gamma", None, &[]).expect("create experiment");

    let page = scoped_a.search_experiments(&SearchQuery::unfiltered()).expect("search");
    let mut names: Vec<&str> = page.items.iter().map(|e| e.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["alpha", "beta"]);

    let page = scoped_a
        .search_experiments(&SearchQuery::filtered("name = 'alpha'"))
        .expect("filtered search");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "alpha");

    // A filter matching only foreign entities yields an empty page.
    let page = scoped_a
        .search_experiments(&SearchQuery::filtered("name = 'gamma'"))
        .expect("foreign filter");
    assert!(page.items.is_empty());
}

/// Verifies writes addressing the reserved tag key are rejected.
#[test]
fn reserved_tag_writes_are_rejected() {
    let (_, scoped_a, _) = two_tenants();
    let experiment = scoped_a.create_experiment("exp", None, &[]).expect("create experiment");
    let run = scoped_a
        .create_run(&experiment.experiment_id, None, 1, &[], None)
        .expect("create run");

    let spoof = Tag::new(TENANT_TAG_KEY, "team-b");
    let err = scoped_a
        .set_experiment_tag(&experiment.experiment_id, &spoof)
        .expect_err("reserved experiment tag");
    assert!(matches!(err, StoreError::InvalidParameter(_)));
    let err = scoped_a
        .delete_experiment_tag(&experiment.experiment_id, TENANT_TAG_KEY)
        .expect_err("reserved experiment tag delete");
    assert!(matches!(err, StoreError::InvalidParameter(_)));
    let err = scoped_a.set_run_tag(&run.run_id, &spoof).expect_err("reserved run tag");
    assert!(matches!(err, StoreError::InvalidParameter(_)));
    let err = scoped_a.delete_run_tag(&run.run_id, TENANT_TAG_KEY).expect_err("reserved delete");
    assert!(matches!(err, StoreError::InvalidParameter(_)));

    // Batched writes are rejected wholesale before anything lands.
    let metric = Metric {
        key: "loss".to_string(),
        value: 0.5,
        timestamp: 10,
        step: 0,
    };
    let err = scoped_a
        .log_batch(&run.run_id, &[metric], &[], &[spoof])
        .expect_err("reserved batch tag");
    assert!(matches!(err, StoreError::InvalidParameter(_)));
    let fetched = scoped_a.get_run(&run.run_id).expect("run");
    assert!(fetched.metrics.is_empty());
}

/// Verifies run creation checks the parent and strips spoofed tags.
#[test]
fn create_run_checks_parent_and_strips_reserved_tag() {
    let (_, scoped_a, scoped_b) = two_tenants();
    let own = scoped_a.create_experiment("a-exp", None, &[]).expect("create experiment");
    let foreign = scoped_b.create_experiment("b-exp", None, &[]).expect("create experiment");

    let err = scoped_a
        .create_run(&foreign.experiment_id, None, 1, &[], None)
        .expect_err("foreign parent");
    assert!(matches!(err, StoreError::PermissionDenied(_)));

    let run = scoped_a
        .create_run(
            &own.experiment_id,
            None,
            1,
            &[Tag::new(TENANT_TAG_KEY, "team-b"), Tag::new("kind", "smoke")],
            Some("first"),
        )
        .expect("create run");
    assert_eq!(tag_value(&run.tags, TENANT_TAG_KEY), None);
    assert_eq!(tag_value(&run.tags, "kind"), Some("smoke"));
    assert_eq!(run.run_name.as_deref(), Some("first"));
}

/// Verifies the context user wins over a caller-supplied user id.
#[test]
fn create_run_prefers_context_user() {
    let backend = Arc::new(InMemoryTrackingStore::new());
    let scoped = ScopedTrackingStore::new(backend.clone(), ctx("team-a").with_user("alice"));
    let experiment = scoped.create_experiment("exp", None, &[]).expect("create experiment");
    let run = scoped
        .create_run(&experiment.experiment_id, Some("mallory"), 1, &[], None)
        .expect("create run");
    assert_eq!(run.user_id.as_deref(), Some("alice"));

    let anonymous = ScopedTrackingStore::new(backend, ctx("team-a"));
    let run = anonymous
        .create_run(&experiment.experiment_id, Some("carol"), 2, &[], None)
        .expect("create run");
    assert_eq!(run.user_id.as_deref(), Some("carol"));
}

/// Verifies child mutations resolve and verify the owning experiment.
#[test]
fn child_mutations_check_owning_experiment() {
    let (_, scoped_a, scoped_b) = two_tenants();
    let foreign = scoped_b.create_experiment("b-exp", None, &[]).expect("create experiment");
    let foreign_run = scoped_b
        .create_run(&foreign.experiment_id, None, 1, &[], None)
        .expect("create run");

    let metric = Metric {
        key: "loss".to_string(),
        value: 0.1,
        timestamp: 5,
        step: 0,
    };
    let param = Param {
        key: "lr".to_string(),
        value: "0.01".to_string(),
    };
    let run_id = foreign_run.run_id.as_str();
    assert!(matches!(
        scoped_a.get_run(run_id).expect_err("get"),
        StoreError::PermissionDenied(_)
    ));
    assert!(matches!(
        scoped_a.log_metric(run_id, &metric).expect_err("log metric"),
        StoreError::PermissionDenied(_)
    ));
    assert!(matches!(
        scoped_a.log_param(run_id, &param).expect_err("log param"),
        StoreError::PermissionDenied(_)
    ));
    assert!(matches!(
        scoped_a.set_run_tag(run_id, &Tag::new("k", "v")).expect_err("set tag"),
        StoreError::PermissionDenied(_)
    ));
    assert!(matches!(
        scoped_a.delete_run(run_id).expect_err("delete"),
        StoreError::PermissionDenied(_)
    ));
    assert!(matches!(
        scoped_a
            .update_run_info(run_id, Some(RunStatus::Finished), Some(9), None)
            .expect_err("update"),
        StoreError::PermissionDenied(_)
    ));

    // The foreign run is untouched by the denied attempts.
    let fetched = scoped_b.get_run(run_id).expect("foreign run");
    assert_eq!(fetched.status, RunStatus::Running);
    assert!(fetched.metrics.is_empty());
}

/// Verifies cross-container run search intersects with the visible set.
#[test]
fn search_runs_intersects_requested_with_visible() {
    let (_, scoped_a, scoped_b) = two_tenants();
    let x = scoped_a.create_experiment("x", None, &[]).expect("create experiment");
    let y = scoped_b.create_experiment("y", None, &[]).expect("create experiment");
    let run_x = scoped_a.create_run(&x.experiment_id, None, 1, &[], None).expect("run");
    scoped_b.create_run(&y.experiment_id, None, 1, &[], None).expect("run");

    // Requesting a foreign container silently narrows to the visible one.
    let page = scoped_a
        .search_runs(
            &[x.experiment_id.clone(), y.experiment_id.clone()],
            &SearchQuery::unfiltered(),
        )
        .expect("search");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].run_id, run_x.run_id);

    // An empty request spans the whole visible set.
    let page = scoped_a.search_runs(&[], &SearchQuery::unfiltered()).expect("search");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].experiment_id, x.experiment_id);

    // A purely foreign request yields an empty page, not an error.
    let page = scoped_a
        .search_runs(std::slice::from_ref(&y.experiment_id), &SearchQuery::unfiltered())
        .expect("search");
    assert!(page.items.is_empty());
    assert!(page.next_page_token.is_none());
}

/// Verifies traces inherit confinement from their owning experiment.
#[test]
fn traces_inherit_experiment_confinement() {
    let (_, scoped_a, scoped_b) = two_tenants();
    let own = scoped_a.create_experiment("a-exp", None, &[]).expect("create experiment");
    let foreign = scoped_b.create_experiment("b-exp", None, &[]).expect("create experiment");
    let own_trace = scoped_a.start_trace(&own.experiment_id, 100, &[]).expect("trace");
    let foreign_trace = scoped_b.start_trace(&foreign.experiment_id, 100, &[]).expect("trace");

    assert!(scoped_a.get_trace_info(&own_trace.request_id).is_ok());
    assert!(matches!(
        scoped_a.get_trace_info(&foreign_trace.request_id).expect_err("foreign trace"),
        StoreError::PermissionDenied(_)
    ));
    assert!(matches!(
        scoped_a
            .set_trace_tag(&foreign_trace.request_id, &Tag::new("k", "v"))
            .expect_err("foreign trace tag"),
        StoreError::PermissionDenied(_)
    ));
    assert!(matches!(
        scoped_a
            .set_trace_tag(&own_trace.request_id, &Tag::new(TENANT_TAG_KEY, "x"))
            .expect_err("reserved trace tag"),
        StoreError::InvalidParameter(_)
    ));
    assert!(matches!(
        scoped_a.start_trace(&foreign.experiment_id, 100, &[]).expect_err("foreign parent"),
        StoreError::PermissionDenied(_)
    ));
}

/// Verifies logged models and datasets scope like other children.
#[test]
fn logged_models_and_datasets_are_scoped() {
    let (_, scoped_a, scoped_b) = two_tenants();
    let x = scoped_a.create_experiment("x", None, &[]).expect("create experiment");
    let y = scoped_b.create_experiment("y", None, &[]).expect("create experiment");
    scoped_a.create_logged_model(&x.experiment_id, "m-a", &[]).expect("logged model");
    scoped_b.create_logged_model(&y.experiment_id, "m-b", &[]).expect("logged model");

    let page = scoped_a
        .search_logged_models(&[], &SearchQuery::unfiltered())
        .expect("search logged models");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "m-a");

    let run_x = scoped_a.create_run(&x.experiment_id, None, 1, &[], None).expect("run");
    let run_y = scoped_b.create_run(&y.experiment_id, None, 1, &[], None).expect("run");
    let dataset = Dataset {
        name: "train".to_string(),
        digest: "d1".to_string(),
        source_type: "local".to_string(),
        source: "file:///train".to_string(),
    };
    scoped_a.log_inputs(&run_x.run_id, std::slice::from_ref(&dataset)).expect("log inputs");
    scoped_b.log_inputs(&run_y.run_id, std::slice::from_ref(&dataset)).expect("log inputs");

    let summaries = scoped_a.search_datasets(&[]).expect("search datasets");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].experiment_id, x.experiment_id);

    // Requesting the foreign container yields nothing.
    let summaries = scoped_a
        .search_datasets(std::slice::from_ref(&y.experiment_id))
        .expect("search datasets");
    assert!(summaries.is_empty());
}

/// Verifies capability gates resolved at construction stay neutral.
#[test]
fn missing_capabilities_degrade_neutrally() {
    let backend = Arc::new(InMemoryTrackingStore::with_capabilities(TrackingCapabilities {
        traces: false,
        logged_models: false,
        datasets: false,
    }));
    let scoped = ScopedTrackingStore::new(backend, ctx("team-a"));
    assert!(!scoped.capabilities().traces);

    let experiment = scoped.create_experiment("exp", None, &[]).expect("create experiment");
    let run = scoped
        .create_run(&experiment.experiment_id, None, 1, &[], None)
        .expect("create run");

    // Entity-returning creates cannot degrade silently.
    assert!(matches!(
        scoped.start_trace(&experiment.experiment_id, 1, &[]).expect_err("start trace"),
        StoreError::Unsupported(_)
    ));
    assert!(matches!(
        scoped.get_trace_info("tr-0").expect_err("trace info"),
        StoreError::Unsupported(_)
    ));
    assert!(matches!(
        scoped
            .create_logged_model(&experiment.experiment_id, "m", &[])
            .expect_err("logged model"),
        StoreError::Unsupported(_)
    ));

    // Reads return the empty shape and child writes are absorbed.
    let page = scoped.search_traces(&[], &SearchQuery::unfiltered()).expect("search traces");
    assert!(page.items.is_empty());
    let page = scoped
        .search_logged_models(&[], &SearchQuery::unfiltered())
        .expect("search logged models");
    assert!(page.items.is_empty());
    assert!(scoped.search_datasets(&[]).expect("search datasets").is_empty());
    scoped.set_trace_tag("tr-0", &Tag::new("k", "v")).expect("absorbed tag write");
    scoped.delete_trace_tag("tr-0", "k").expect("absorbed tag delete");

    let dataset = Dataset {
        name: "train".to_string(),
        digest: "d1".to_string(),
        source_type: "local".to_string(),
        source: "file:///train".to_string(),
    };
    scoped.log_inputs(&run.run_id, &[dataset]).expect("absorbed inputs");

    // Ownership is still enforced before the absorbing return.
    assert!(matches!(
        scoped.log_inputs("missing", &[]).expect_err("missing run"),
        StoreError::NotFound(_)
    ));
}
