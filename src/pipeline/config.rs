use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::PipelineError;
use crate::store::keys;

/// Build-deploy pipeline settings.
///
/// Command lines are split shell-style and may use the placeholders `{file}` (the
/// materialized source file), `{dir}` (the run workspace), `{version}` (source object
/// version) and `{run_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name under `codegen-output/` whose new versions trigger a run
    pub artifact_name: String,
    pub install: Vec<String>,
    pub build: Vec<String>,
    pub deploy: Vec<String>,
    /// Bound on every single command
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    /// How often the watcher checks the trigger key
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Revisions waiting for the worker; further arrivals wait for space
    pub queue_capacity: usize,
    /// Environment variables copied into every command
    pub pass_env: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_name: "stack.ts".to_string(),
            install: vec!["npm install --no-audit --no-fund aws-cdk-lib constructs".to_string()],
            build: vec!["npx tsc --noEmit --skipLibCheck {file}".to_string()],
            deploy: vec![
                r#"npx cdk deploy --all --require-approval never --app "npx ts-node {file}""#
                    .to_string(),
            ],
            command_timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(30),
            queue_capacity: 16,
            pass_env: [
                "AWS_REGION",
                "AWS_DEFAULT_REGION",
                "AWS_PROFILE",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "AWS_SESSION_TOKEN",
                "HOME",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl PipelineConfig {
    pub fn source_key(&self) -> String {
        keys::codegen_output_key(&self.artifact_name)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !keys::is_safe_segment(&self.artifact_name) {
            return Err(PipelineError::Configuration(format!(
                "artifact name '{}' must be a single key segment",
                self.artifact_name
            )));
        }
        if self.deploy.iter().all(|c| c.trim().is_empty()) {
            return Err(PipelineError::Configuration(
                "at least one deploy command is required".to_string(),
            ));
        }
        if self.command_timeout.is_zero() || self.poll_interval.is_zero() {
            return Err(PipelineError::Configuration(
                "command_timeout and poll_interval must be non-zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::Configuration(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source_key(), "codegen-output/stack.ts");
    }

    #[test]
    fn test_rejects_nested_artifact_name_and_empty_deploy() {
        let config = PipelineConfig {
            artifact_name: "../stack.ts".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            deploy: vec![" ".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            artifact_name = "stack.ts.gz"
            build = ["npm test"]
            poll_interval = "5s"
            "#,
        )
        .unwrap();
        assert_eq!(config.build, vec!["npm test".to_string()]);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.queue_capacity, 16);
        assert!(config.validate().is_ok());
    }
}
