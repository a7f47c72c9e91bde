//! Status read model and its HTTP router
//!
//! Observes store state (scenarios, generated artifacts, execution and pipeline run
//! records, mirrored experiments) without mutating anything.

pub mod api;
pub mod experiments;
pub mod read_model;

pub use api::{router, serve, ApiError};
pub use experiments::{
    mirror_experiment, ExperimentDetail, ExperimentLogEntry, ExperimentRecord, ExperimentSource,
    ExperimentState, StoreExperimentSource,
};
pub use read_model::{ScenarioDetail, ScenarioSummary, StatusService, MAX_EXECUTIONS};
