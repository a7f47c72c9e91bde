//! Workflow states and the transition function

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::definition::WorkflowDefinition;

/// A task state that wraps one capability invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StepKind {
    GenerateScenario,
    AnalyzeScenario,
    Deploy,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::GenerateScenario => "GenerateScenario",
            StepKind::AnalyzeScenario => "AnalyzeScenario",
            StepKind::Deploy => "Deploy",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    GenerateScenario,
    AnalyzeScenario,
    Deploy,
    Succeeded,
    Failed,
    TimedOut,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Succeeded | WorkflowState::Failed | WorkflowState::TimedOut
        )
    }

    /// The task this state runs, `None` for terminal states
    pub fn step(&self) -> Option<StepKind> {
        match self {
            WorkflowState::GenerateScenario => Some(StepKind::GenerateScenario),
            WorkflowState::AnalyzeScenario => Some(StepKind::AnalyzeScenario),
            WorkflowState::Deploy => Some(StepKind::Deploy),
            _ => None,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match self {
            WorkflowState::Succeeded => ExecutionStatus::Succeeded,
            WorkflowState::Failed => ExecutionStatus::Failed,
            WorkflowState::TimedOut => ExecutionStatus::TimedOut,
            _ => ExecutionStatus::Running,
        }
    }
}

impl From<StepKind> for WorkflowState {
    fn from(step: StepKind) -> Self {
        match step {
            StepKind::GenerateScenario => WorkflowState::GenerateScenario,
            StepKind::AnalyzeScenario => WorkflowState::AnalyzeScenario,
            StepKind::Deploy => WorkflowState::Deploy,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step() {
            Some(step) => fmt::Display::fmt(&step, f),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Externally visible execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Succeeded => "SUCCEEDED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::TimedOut => "TIMED_OUT",
        };
        f.write_str(s)
    }
}

/// What happened in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// The task produced output
    Completed,
    /// The task failed with an error its retry policy did not absorb
    Failed,
    /// The execution deadline passed
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("execution already finished in state {0}")]
    AlreadyTerminal(WorkflowState),

    #[error("state {state} is not part of workflow '{workflow}'")]
    UnknownState {
        state: WorkflowState,
        workflow: String,
    },
}

/// Compute the state that follows `current` after `event`
pub fn next_state(
    current: WorkflowState,
    event: StepEvent,
    definition: &WorkflowDefinition,
) -> Result<WorkflowState, TransitionError> {
    let step = match current.step() {
        Some(step) => step,
        None => return Err(TransitionError::AlreadyTerminal(current)),
    };
    if !definition.steps.contains(&step) {
        return Err(TransitionError::UnknownState {
            state: current,
            workflow: definition.name.clone(),
        });
    }

    Ok(match event {
        StepEvent::Completed => definition
            .step_after(step)
            .map(WorkflowState::from)
            .unwrap_or(WorkflowState::Succeeded),
        StepEvent::Failed => WorkflowState::Failed,
        StepEvent::DeadlineExceeded => WorkflowState::TimedOut,
    })
}
