// crates/tenant-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for tenant-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use tenant_gate_config::TenantGateConfig;

/// Parses a TOML string into a `TenantGateConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<TenantGateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<TenantGateConfig, toml::de::Error> {
    config_from_toml("")
}
