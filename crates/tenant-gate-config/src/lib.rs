// crates/tenant-gate-config/src/lib.rs
// ============================================================================
// Module: Tenant Gate Config Library
// Description: Canonical config model and validation for the gateway.
// Purpose: Single source of truth for tenant-gate.toml semantics.
// Dependencies: tenant-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `tenant-gate-config` defines the canonical configuration model for the
//! tenant gateway. Configuration is loaded from a TOML file with hard size
//! and path limits, and every section is validated before use. Missing or
//! invalid configuration fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
