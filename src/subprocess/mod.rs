//! Subprocess execution for deploy and pipeline commands
//!
//! Deploy steps and pipeline stages never spawn processes themselves. They hold an
//! `Arc<dyn ProcessRunner>`: [`TokioProcessRunner`] in production and
//! [`MockProcessRunner`] in tests. Configured command lines are parsed once with
//! [`CommandLine`] and expanded per run with [`Placeholders`].

pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;
pub mod shell;

#[cfg(test)]
mod tests;

pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{
    ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner,
    MAX_CAPTURED_BYTES,
};
pub use shell::{CommandLine, Placeholders};
