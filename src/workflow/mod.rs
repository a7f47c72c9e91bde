//! Scenario workflow orchestration
//!
//! A workflow is a fixed sequence of task states (GenerateScenario, AnalyzeScenario
//! and optionally Deploy). Every task carries the same retry policy and the whole
//! execution is bounded by the definition's timeout.

pub mod definition;
pub mod engine;
pub mod execution;
pub mod registry;
pub mod retry;
pub mod state;

pub use definition::{DefinitionError, WorkflowDefinition};
pub use engine::{Capabilities, Orchestrator};
pub use execution::{
    ArtifactKind, ArtifactRef, AttemptOutcome, AttemptRecord, ErrorInfo, ExecutionId,
    ExecutionInput, ExecutionSummary, WorkflowExecution,
};
pub use registry::ExecutionRegistry;
pub use retry::RetryPolicy;
pub use state::{next_state, ExecutionStatus, StepEvent, StepKind, TransitionError, WorkflowState};
