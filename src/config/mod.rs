//! chaosforge configuration
//!
//! One TOML document with a section per component. Every field has a default, so an
//! empty or missing file yields a working local setup (filesystem store, generation
//! and analysis only).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub mod loader;

pub use loader::{default_config_path, load_config, resolve_config_path, CONFIG_FILE_NAME};

use crate::capability::{AnalyzerSettings, DeployCommands, GeneratorSettings};
use crate::error::{ChaosError, ErrorCode};
use crate::pipeline::PipelineConfig;
use crate::store::{BackendType, StoreConfig, StoreFactory};
use crate::subprocess::CommandLine;
use crate::workflow::{RetryPolicy, WorkflowDefinition};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    pub store: StoreConfig,
    pub workflow: WorkflowSection,
    pub generator: GeneratorSettings,
    pub analyzer: AnalyzerSettings,
    pub deploy: DeploySection,
    pub pipeline: PipelineConfig,
    pub status: StatusSection,
    pub logging: LoggingSection,
}

/// Retry policy and execution bounds shared by both workflow definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSection {
    pub retry: RetryPolicy,
    /// Bound for generate + analyze executions
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Bound for executions that also deploy
    #[serde(with = "humantime_serde")]
    pub deploy_timeout: Duration,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        let generation = WorkflowDefinition::generation_and_analysis();
        Self {
            retry: RetryPolicy::default(),
            timeout: generation.timeout,
            deploy_timeout: WorkflowDefinition::with_deploy().timeout,
        }
    }
}

impl WorkflowSection {
    pub fn definition(&self, include_deploy: bool) -> WorkflowDefinition {
        let base = if include_deploy {
            WorkflowDefinition {
                timeout: self.deploy_timeout,
                ..WorkflowDefinition::with_deploy()
            }
        } else {
            WorkflowDefinition {
                timeout: self.timeout,
                ..WorkflowDefinition::generation_and_analysis()
            }
        };
        WorkflowDefinition {
            retry: self.retry.clone(),
            ..base
        }
    }
}

/// How the Deploy step applies generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Run the deploy commands from the workflow
    #[default]
    Direct,
    /// Copy the code to the pipeline trigger key
    Pipeline,
}

impl FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "pipeline" => Ok(Self::Pipeline),
            other => Err(format!("unknown deploy mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySection {
    pub mode: DeployMode,
    #[serde(flatten)]
    pub commands: DeployCommands,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    pub bind: SocketAddr,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive used when neither `-v` nor `RUST_LOG` is given
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl ChaosConfig {
    /// Apply `CHAOSFORGE_*` overrides from the process environment
    pub fn merge_env_vars(&mut self) -> Result<(), ChaosError> {
        self.apply_env_overrides(|name| std::env::var(name).ok())
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ChaosError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invalid = |name: &str, reason: String| {
            ChaosError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("{}: {}", name, reason),
            )
        };

        if let Some(value) = lookup("CHAOSFORGE_STORE_BACKEND") {
            self.store.backend = value
                .parse::<BackendType>()
                .map_err(|e| invalid("CHAOSFORGE_STORE_BACKEND", e))?;
        }
        if let Some(value) = lookup("CHAOSFORGE_STORE_ROOT") {
            self.store.file.root = value.into();
        }
        if let Some(value) = lookup("CHAOSFORGE_BUCKET") {
            self.store.bucket = value;
        }
        if let Some(value) = lookup("CHAOSFORGE_MODEL_ENDPOINT") {
            self.generator.endpoint = value
                .parse()
                .map_err(|e: url::ParseError| invalid("CHAOSFORGE_MODEL_ENDPOINT", e.to_string()))?;
        }
        if let Some(value) = lookup("CHAOSFORGE_API_KEY_ENV") {
            self.generator.api_key_env = value;
        }
        if let Some(value) = lookup("CHAOSFORGE_DEPLOY_MODE") {
            self.deploy.mode = value
                .parse::<DeployMode>()
                .map_err(|e| invalid("CHAOSFORGE_DEPLOY_MODE", e))?;
        }
        if let Some(value) = lookup("CHAOSFORGE_LOG_LEVEL") {
            self.logging.level = Some(value);
        }
        if let Some(value) = lookup("CHAOSFORGE_LOG_JSON") {
            self.logging.json = value
                .parse::<bool>()
                .map_err(|e| invalid("CHAOSFORGE_LOG_JSON", e.to_string()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ChaosError> {
        let invalid =
            |message: String| ChaosError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, message);

        StoreFactory::validate(&self.store).map_err(|e| invalid(e.to_string()))?;
        for include_deploy in [false, true] {
            self.workflow.definition(include_deploy).validate()?;
        }
        if let Some(line) = &self.deploy.commands.validate {
            CommandLine::parse(line).map_err(|e| invalid(format!("deploy.validate: {}", e)))?;
        }
        CommandLine::parse(&self.deploy.commands.deploy)
            .map_err(|e| invalid(format!("deploy.deploy: {}", e)))?;
        self.pipeline
            .validate()
            .map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    pub fn workflow_definition(&self, include_deploy: bool) -> WorkflowDefinition {
        self.workflow.definition(include_deploy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config: ChaosConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.deploy.mode, DeployMode::Direct);
        assert_eq!(config.workflow.timeout, Duration::from_secs(600));
        assert_eq!(config.workflow.deploy_timeout, Duration::from_secs(2700));
        assert_eq!(config.status.bind.port(), 8080);
    }

    #[test]
    fn test_sections_parse() {
        let config: ChaosConfig = toml::from_str(
            r#"
            [store]
            backend = "memory"
            bucket = "chaos-dev"

            [workflow]
            timeout = "2m"
            [workflow.retry]
            max_attempts = 4

            [deploy]
            mode = "pipeline"
            deploy = "cdk deploy {stack}"

            [pipeline]
            artifact_name = "stack.ts.gz"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.backend, BackendType::Memory);
        assert_eq!(config.deploy.mode, DeployMode::Pipeline);
        assert_eq!(config.deploy.commands.deploy, "cdk deploy {stack}");

        let definition = config.workflow_definition(false);
        assert_eq!(definition.timeout, Duration::from_secs(120));
        assert_eq!(definition.retry.max_attempts, 4);
        let with_deploy = config.workflow_definition(true);
        assert_eq!(with_deploy.timeout, Duration::from_secs(2700));
        assert_eq!(with_deploy.retry.max_attempts, 4);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CHAOSFORGE_STORE_BACKEND", "memory"),
            ("CHAOSFORGE_BUCKET", "from-env"),
            ("CHAOSFORGE_DEPLOY_MODE", "pipeline"),
            ("CHAOSFORGE_LOG_JSON", "true"),
        ]);
        let mut config = ChaosConfig::default();
        config
            .apply_env_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.store.backend, BackendType::Memory);
        assert_eq!(config.store.bucket, "from-env");
        assert_eq!(config.deploy.mode, DeployMode::Pipeline);
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_env_override_is_rejected() {
        let mut config = ChaosConfig::default();
        let err = config
            .apply_env_overrides(|name| {
                (name == "CHAOSFORGE_DEPLOY_MODE").then(|| "sideways".to_string())
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
    }

    #[test]
    fn test_zero_retry_attempts_fail_validation() {
        let mut config = ChaosConfig::default();
        config.workflow.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
