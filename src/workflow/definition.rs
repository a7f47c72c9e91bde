//! Workflow definitions: the task sequence, retry policy and overall timeout

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::retry::RetryPolicy;
use super::state::StepKind;
use crate::error::{ChaosError, ErrorCode};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("workflow '{0}' has no steps")]
    Empty(String),

    #[error("workflow '{workflow}' must run steps in order GenerateScenario, AnalyzeScenario[, Deploy], got {steps}")]
    InvalidSequence { workflow: String, steps: String },

    #[error("workflow '{0}' needs a non-zero timeout")]
    ZeroTimeout(String),

    #[error("invalid retry policy: {0}")]
    InvalidRetry(String),
}

impl From<DefinitionError> for ChaosError {
    fn from(err: DefinitionError) -> Self {
        ChaosError::workflow_with_code(
            ErrorCode::WORKFLOW_INVALID_DEFINITION,
            err.to_string(),
            None,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub steps: Vec<StepKind>,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Bound on the whole execution, measured from start
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl WorkflowDefinition {
    /// Generate and analyze only, bounded at 10 minutes
    pub fn generation_and_analysis() -> Self {
        Self {
            name: "chaos-generation".to_string(),
            steps: vec![StepKind::GenerateScenario, StepKind::AnalyzeScenario],
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(10 * 60),
        }
    }

    /// Generate, analyze and deploy, bounded at 45 minutes
    pub fn with_deploy() -> Self {
        Self {
            name: "chaos-generation-deploy".to_string(),
            steps: vec![
                StepKind::GenerateScenario,
                StepKind::AnalyzeScenario,
                StepKind::Deploy,
            ],
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(45 * 60),
        }
    }

    pub fn includes_deploy(&self) -> bool {
        self.steps.contains(&StepKind::Deploy)
    }

    pub fn first_step(&self) -> Option<StepKind> {
        self.steps.first().copied()
    }

    pub fn step_after(&self, step: StepKind) -> Option<StepKind> {
        let index = self.steps.iter().position(|s| *s == step)?;
        self.steps.get(index + 1).copied()
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty(self.name.clone()));
        }
        let allowed: [&[StepKind]; 2] = [
            &[StepKind::GenerateScenario, StepKind::AnalyzeScenario],
            &[
                StepKind::GenerateScenario,
                StepKind::AnalyzeScenario,
                StepKind::Deploy,
            ],
        ];
        if !allowed.contains(&self.steps.as_slice()) {
            let steps = self
                .steps
                .iter()
                .map(StepKind::as_str)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(DefinitionError::InvalidSequence {
                workflow: self.name.clone(),
                steps,
            });
        }
        if self.timeout.is_zero() {
            return Err(DefinitionError::ZeroTimeout(self.name.clone()));
        }
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_definitions_are_valid() {
        let generation = WorkflowDefinition::generation_and_analysis();
        assert!(generation.validate().is_ok());
        assert_eq!(generation.timeout, Duration::from_secs(600));
        assert!(!generation.includes_deploy());

        let deploy = WorkflowDefinition::with_deploy();
        assert!(deploy.validate().is_ok());
        assert_eq!(deploy.timeout, Duration::from_secs(2700));
        assert_eq!(deploy.first_step(), Some(StepKind::GenerateScenario));
        assert_eq!(
            deploy.step_after(StepKind::AnalyzeScenario),
            Some(StepKind::Deploy)
        );
        assert_eq!(deploy.step_after(StepKind::Deploy), None);
    }

    #[test]
    fn test_rejects_out_of_order_steps() {
        let definition = WorkflowDefinition {
            steps: vec![StepKind::AnalyzeScenario, StepKind::GenerateScenario],
            ..WorkflowDefinition::generation_and_analysis()
        };
        let err = definition.validate().unwrap_err();
        assert!(err
            .to_string()
            .contains("AnalyzeScenario -> GenerateScenario"));

        let skipping = WorkflowDefinition {
            steps: vec![StepKind::GenerateScenario, StepKind::Deploy],
            ..WorkflowDefinition::with_deploy()
        };
        assert!(skipping.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout_and_bad_retry() {
        let definition = WorkflowDefinition {
            timeout: Duration::ZERO,
            ..WorkflowDefinition::with_deploy()
        };
        assert_eq!(
            definition.validate(),
            Err(DefinitionError::ZeroTimeout("chaos-generation-deploy".into()))
        );

        let mut definition = WorkflowDefinition::with_deploy();
        definition.retry.max_attempts = 0;
        assert!(matches!(
            definition.validate(),
            Err(DefinitionError::InvalidRetry(_))
        ));
    }

    #[test]
    fn test_definition_from_toml() {
        let definition: WorkflowDefinition = toml::from_str(
            r#"
            name = "custom"
            steps = ["GenerateScenario", "AnalyzeScenario", "Deploy"]
            timeout = "30m"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert!(definition.validate().is_ok());
        assert_eq!(definition.timeout, Duration::from_secs(1800));
        assert_eq!(definition.retry.max_attempts, 5);
        assert_eq!(definition.retry.interval, Duration::from_secs(5));
    }
}
