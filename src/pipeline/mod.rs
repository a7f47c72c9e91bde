//! Build-deploy pipeline
//!
//! An independently triggered Source → Build → Deploy lifecycle keyed on new versions
//! of `codegen-output/<artifact-name>`. Stage failures are terminal for the run.

pub mod config;
pub mod error;
pub mod executor;
pub mod run;
pub mod source;
pub mod trigger;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use executor::PipelineExecutor;
pub use run::{CommandRecord, PipelineRun, RunStatus, Stage, StageRecord, StageStatus};
pub use source::{SourceArtifact, SourceRevision};
pub use trigger::{spawn_worker, PipelineWatcher, WorkerReport};
