// crates/tenant-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Tenant Gate Runtime
// Description: Scoping decorators and in-memory store backends.
// Purpose: Enforce tenant confinement over any store implementation.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules wrap store backends with tenant confinement. The scoped
//! stores are the enforcement layer: they consult the tenant context on
//! every call and never trust the caller's own scoping. The in-memory
//! backends exist so the wrappers can be exercised without external
//! services.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod memory;
pub mod scoped_registry;
pub mod scoped_tracking;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use memory::InMemoryRegistryStore;
pub use memory::InMemoryTrackingStore;
pub use scoped_registry::ScopedRegistryStore;
pub use scoped_tracking::ScopedTrackingStore;
