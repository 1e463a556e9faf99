//! `RunPod` CLI - command-line client for `RunPod` GPU pods.
//!
//! A thin wrapper over the `RunPod` GraphQL API with:
//! - **Configuration resolution**: defaults < YAML file < environment < flags
//! - **Pod lifecycle**: create, start, stop, destroy
//! - **Pod queries**: list, rendered as tables
//!
//! ## Quick Start
//!
//! Put your API key in the environment (a `.env` file works too):
//!
//! ```text
//! RUNPOD_API_KEY=your_api_key_here
//! ```
//!
//! Then drive pods from the command line:
//!
//! ```text
//! runpod-cli list
//! runpod-cli create --gpu-type-id "NVIDIA A40" --image-name pytorch/pytorch:latest
//! runpod-cli stop <POD_ID>
//! runpod-cli terminate <POD_ID>
//! ```
//!
//! Defaults for `create` live in a YAML config file (`--config-file`)
//! mirroring the flag schema; any flag overrides the file, and `--strict`
//! rejects keys the schema does not know.

// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(clippy::unwrap_used)]         // unwrap() is forbidden
#![deny(clippy::expect_used)]         // expect() is forbidden
#![deny(clippy::panic)]               // panic!() is forbidden
#![deny(clippy::print_stdout)]        // println!() is forbidden in the library

// ============================================================================
// Modules
// ============================================================================

/// Command-line surface and dispatch.
///
/// Use this module to parse arguments and run one pod lifecycle command.
pub mod runpod_cli;

/// GraphQL client for the `RunPod` API.
///
/// Use this module to issue single pod lifecycle operations.
pub mod runpod_client;

/// Configuration resolution.
///
/// Use this module to merge defaults, config file, environment and flags
/// into one immutable configuration.
pub mod runpod_config;

/// Table rendering for command output.
///
/// Use this module to turn API responses into printable tables.
pub mod runpod_output;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use runpod_cli::{Cli, CliError, Commands};
pub use runpod_client::{PodStatusUpdate, PodSummary, RunpodClient, RunpodClientError};
pub use runpod_config::{CloudType, ConfigError, RunpodConfig, resolve};
pub use runpod_output::{pod_table, status_table};
