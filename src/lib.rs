//! # chaosforge
//!
//! Generates chaos-engineering scenarios from stored templates, turns them into
//! infrastructure code and an experiment template, and optionally deploys the
//! result, either directly or through a build-deploy pipeline.
//!
//! ## Modules
//!
//! - `workflow` - Orchestrator state machine with per-step retry and an execution timeout
//! - `capability` - Scenario generator, analyzer and deployer contracts and implementations
//! - `store` - Template store backends, key layout and per-capability access contracts
//! - `pipeline` - Source, Build and Deploy stages triggered by new source versions
//! - `status` - Read model over stored artifacts and its HTTP API
//! - `subprocess` - Process execution abstraction used by deploy commands and the pipeline
//! - `config` - Configuration file, environment overrides and validation
//! - `cli` - Command-line parsing and command handlers
pub mod app;
pub mod capability;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod scenario;
pub mod status;
pub mod store;
pub mod subprocess;
pub mod workflow;

pub use error::{ChaosError, ErrorCode};
