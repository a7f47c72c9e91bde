//! CLI argument parsing, routing and command handlers

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands, PipelineCommands};
pub use router::execute_command;
