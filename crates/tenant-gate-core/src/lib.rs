// crates/tenant-gate-core/src/lib.rs
// ============================================================================
// Module: Tenant Gate Core Library
// Description: Public API surface for the tenant isolation core.
// Purpose: Expose tenant identity, store contracts, and scoping decorators.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Tenant Gate core confines a shared tracking service to per-tenant views.
//! It provides tenant identity validation, the request classifier used for
//! delegated authorization, store contracts for the tracking and registry
//! surfaces, and decorators that enforce tag- and prefix-based isolation on
//! any store implementation. It performs no I/O of its own and integrates
//! through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::DEFAULT_MAX_RESULTS;
pub use interfaces::ModelRegistryStore;
pub use interfaces::RegistryCapabilities;
pub use interfaces::SearchQuery;
pub use interfaces::StoreError;
pub use interfaces::StoreResult;
pub use interfaces::TrackingCapabilities;
pub use interfaces::TrackingStore;
pub use runtime::InMemoryRegistryStore;
pub use runtime::InMemoryTrackingStore;
pub use runtime::ScopedRegistryStore;
pub use runtime::ScopedTrackingStore;
