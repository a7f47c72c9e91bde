//! Command implementation modules
//!
//! Each CLI command is implemented in its own module.

pub mod pipeline;
pub mod run;
pub mod serve;
pub mod status;
pub mod templates;

// Re-export command execution functions
pub use pipeline::{run_pipeline_once, run_pipeline_watch};
pub use run::{run_workflow, RunParams};
pub use serve::run_serve;
pub use status::{run_executions_command, run_status_command};
pub use templates::{run_import_experiment, run_upload_template};
