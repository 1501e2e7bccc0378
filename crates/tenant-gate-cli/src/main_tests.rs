// crates/tenant-gate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and output helpers.
// Purpose: Ensure CLI surface stays stable and config failures stay closed.
// Dependencies: tenant-gate-cli main helpers
// ============================================================================

//! ## Overview
//! Validates the clap surface and the config-validation failure path.
//!
//! Security posture: CLI inputs are untrusted; load failures must reject.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions use unwrap/expect and debug formatting for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use clap::Parser;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ConfigValidateCommand;
use super::command_config_validate;
use super::output_error;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn version_flag_parses_without_subcommand() {
    let cli = Cli::try_parse_from(["tenant-gate", "--version"]).expect("parse");
    assert!(cli.show_version);
    assert!(cli.command.is_none());
}

#[test]
fn serve_accepts_config_path() {
    let cli =
        Cli::try_parse_from(["tenant-gate", "serve", "--config", "/etc/tenant-gate.toml"])
            .expect("parse");
    match cli.command {
        Some(Commands::Serve(command)) => {
            assert_eq!(command.config, Some(PathBuf::from("/etc/tenant-gate.toml")));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn config_validate_accepts_config_path() {
    let cli = Cli::try_parse_from(["tenant-gate", "config", "validate", "--config", "a.toml"])
        .expect("parse");
    match cli.command {
        Some(Commands::Config {
            command: ConfigCommand::Validate(command),
        }) => {
            assert_eq!(command.config, Some(PathBuf::from("a.toml")));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn unknown_subcommand_is_rejected() {
    let result = Cli::try_parse_from(["tenant-gate", "frobnicate"]);
    assert!(result.is_err());
}

#[test]
fn config_validate_rejects_missing_file() {
    let command = ConfigValidateCommand {
        config: Some(PathBuf::from("/nonexistent/tenant-gate.toml")),
    };
    let err = command_config_validate(&command).expect_err("missing config must fail");
    assert!(err.to_string().starts_with("config load failed: "), "unexpected error: {err}");
}

#[test]
fn output_error_names_the_stream() {
    let io_err = std::io::Error::other("pipe closed");
    let message = output_error("stdout", &io_err);
    assert!(message.contains("stdout"), "unexpected message: {message}");
    assert!(message.contains("pipe closed"), "unexpected message: {message}");
}
