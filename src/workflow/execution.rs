//! Execution records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::state::{next_state, ExecutionStatus, StepEvent, StepKind, TransitionError, WorkflowState};
use super::definition::WorkflowDefinition;
use crate::capability::{CapabilityError, FailureClass};
use crate::store::keys::is_safe_segment;

/// Identifier of one workflow execution, usable as a key segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn generate() -> Self {
        Self(format!("exec-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_safe_segment(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("invalid execution id '{}'", s))
        }
    }
}

/// Trigger input for one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInput {
    pub bucket: String,
    pub template_key: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Passed to the deploy step as environment variables
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ExecutionInput {
    pub fn new(bucket: impl Into<String>, template_key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            template_key: template_key.into(),
            name: None,
            parameters: BTreeMap::new(),
        }
    }
}

/// Error context recorded when an execution fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub step: StepKind,
    pub class: FailureClass,
    pub category: String,
    pub message: String,
    pub attempts: u32,
}

impl ErrorInfo {
    pub fn from_capability(step: StepKind, err: &CapabilityError, attempts: u32) -> Self {
        Self {
            step,
            class: err.class,
            category: err.category.clone(),
            message: err.message.clone(),
            attempts,
        }
    }

    /// A step that could not be invoked at all, e.g. its input was never produced
    pub fn internal(step: StepKind, message: impl Into<String>) -> Self {
        Self {
            step,
            class: FailureClass::Permanent,
            category: "internal".to_string(),
            message: message.into(),
            attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Running,
    Succeeded,
    Failed {
        class: FailureClass,
        category: String,
        message: String,
    },
    /// The deadline passed while the call was in flight; its result is discarded
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub step: StepKind,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Scenario,
    StackCode,
    ExperimentTemplate,
    PipelineSource,
}

/// An artifact linked into the execution's trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub name: String,
    pub workflow: String,
    pub input: ExecutionInput,
    pub state: WorkflowState,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default)]
    pub output: Option<Value>,
}

/// Status view returned by `get_status` and the executions listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: ExecutionId,
    pub name: String,
    pub status: ExecutionStatus,
    pub state: WorkflowState,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub error: Option<ErrorInfo>,
}

impl WorkflowExecution {
    pub fn new(
        id: ExecutionId,
        definition: &WorkflowDefinition,
        input: ExecutionInput,
        started_at: DateTime<Utc>,
    ) -> Self {
        let name = input
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", definition.name, started_at.format("%Y%m%dT%H%M%S")));
        Self {
            id,
            name,
            workflow: definition.name.clone(),
            input,
            state: WorkflowState::GenerateScenario,
            status: ExecutionStatus::Running,
            started_at,
            stopped_at: None,
            error: None,
            attempts: Vec::new(),
            artifacts: Vec::new(),
            output: None,
        }
    }

    /// Apply a transition; entering a terminal state stamps `stopped_at`
    pub fn transition(
        &mut self,
        event: StepEvent,
        definition: &WorkflowDefinition,
    ) -> Result<WorkflowState, TransitionError> {
        let next = next_state(self.state, event, definition)?;
        self.state = next;
        self.status = next.status();
        if next.is_terminal() {
            self.stopped_at = Some(Utc::now());
        }
        Ok(next)
    }

    pub fn begin_attempt(&mut self, step: StepKind, attempt: u32) {
        self.attempts.push(AttemptRecord {
            step,
            attempt,
            started_at: Utc::now(),
            finished_at: None,
            outcome: AttemptOutcome::Running,
        });
    }

    /// Close the most recent running attempt of `step`
    pub fn finish_attempt(&mut self, step: StepKind, outcome: AttemptOutcome) {
        if let Some(record) = self
            .attempts
            .iter_mut()
            .rev()
            .find(|r| r.step == step && r.outcome == AttemptOutcome::Running)
        {
            record.finished_at = Some(Utc::now());
            record.outcome = outcome;
        }
    }

    pub fn attempts_for(&self, step: StepKind) -> u32 {
        self.attempts.iter().filter(|r| r.step == step).count() as u32
    }

    pub fn link_artifact(&mut self, kind: ArtifactKind, key: impl Into<String>) {
        let key = key.into();
        if !self.artifacts.iter().any(|a| a.key == key) {
            self.artifacts.push(ArtifactRef { kind, key });
        }
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            state: self.state,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution() -> WorkflowExecution {
        WorkflowExecution::new(
            ExecutionId::generate(),
            &WorkflowDefinition::generation_and_analysis(),
            ExecutionInput::new("bucket", "templates/t.json"),
            Utc::now(),
        )
    }

    #[test]
    fn test_execution_id() {
        let id = ExecutionId::generate();
        assert!(id.as_str().starts_with("exec-"));
        assert!(is_safe_segment(id.as_str()));
        assert!("exec-1".parse::<ExecutionId>().is_ok());
        assert!("../etc".parse::<ExecutionId>().is_err());
    }

    #[test]
    fn test_terminal_transition_stamps_stop_time() {
        let definition = WorkflowDefinition::generation_and_analysis();
        let mut exec = execution();
        assert!(exec.name.starts_with("chaos-generation-"));
        exec.transition(StepEvent::Completed, &definition).unwrap();
        assert!(exec.stopped_at.is_none());
        exec.transition(StepEvent::Failed, &definition).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert!(exec.stopped_at.is_some());
        // Exactly one terminal status
        assert!(exec.transition(StepEvent::Completed, &definition).is_err());
        assert_eq!(exec.status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_internal_error_closes_execution() {
        let definition = WorkflowDefinition::generation_and_analysis();
        let mut exec = execution();
        exec.transition(StepEvent::Completed, &definition).unwrap();
        assert_eq!(exec.state, WorkflowState::AnalyzeScenario);

        exec.error = Some(ErrorInfo::internal(
            StepKind::AnalyzeScenario,
            "AnalyzeScenario reached without a persisted scenario",
        ));
        exec.transition(StepEvent::Failed, &definition).unwrap();

        assert_eq!(exec.status, ExecutionStatus::Failed);
        let error = exec.error.as_ref().unwrap();
        assert_eq!(error.category, "internal");
        assert_eq!(error.class, FailureClass::Permanent);
        assert_eq!(error.attempts, 0);
        assert!(exec.summary().error.is_some());
    }

    #[test]
    fn test_attempt_bookkeeping() {
        let mut exec = execution();
        exec.begin_attempt(StepKind::GenerateScenario, 1);
        exec.finish_attempt(
            StepKind::GenerateScenario,
            AttemptOutcome::Failed {
                class: FailureClass::Transient,
                category: "throttled".into(),
                message: "429".into(),
            },
        );
        exec.begin_attempt(StepKind::GenerateScenario, 2);
        exec.finish_attempt(StepKind::GenerateScenario, AttemptOutcome::Succeeded);

        assert_eq!(exec.attempts_for(StepKind::GenerateScenario), 2);
        assert_eq!(exec.attempts_for(StepKind::AnalyzeScenario), 0);
        assert_eq!(exec.attempts[1].outcome, AttemptOutcome::Succeeded);
        assert!(exec.attempts[0].finished_at.is_some());
    }

    #[test]
    fn test_artifacts_are_linked_once() {
        let mut exec = execution();
        exec.link_artifact(ArtifactKind::Scenario, "scenarios/e/s.json");
        exec.link_artifact(ArtifactKind::Scenario, "scenarios/e/s.json");
        assert_eq!(exec.artifacts.len(), 1);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let exec = execution();
        let json = serde_json::to_string(&exec).unwrap();
        let back: WorkflowExecution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, exec);
        assert!(json.contains("\"status\":\"RUNNING\""));
    }
}
