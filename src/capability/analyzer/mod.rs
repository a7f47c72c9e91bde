//! Scenario analyzer: validation, service extraction and artifact generation

pub mod codegen;
pub mod experiment;
pub mod services;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::payload::{AnalyzeOutput, AnalyzeRequest};
use super::{CapabilityError, ScenarioAnalyzer};
use crate::scenario::GeneratedScenario;
use crate::store::{keys, write_json_once, write_once, ObjectStore, ScopedStore};
use codegen::StackRenderer;

pub use services::TargetService;

/// Settings baked into generated artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    #[serde(default = "default_project_tag")]
    pub project_tag: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_role_arn")]
    pub role_arn: String,
    #[serde(default = "default_stop_alarm_arn")]
    pub stop_alarm_arn: String,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            project_tag: default_project_tag(),
            environment: default_environment(),
            role_arn: default_role_arn(),
            stop_alarm_arn: default_stop_alarm_arn(),
        }
    }
}

fn default_project_tag() -> String {
    "ChaosEngineering".to_string()
}

fn default_environment() -> String {
    "test".to_string()
}

fn default_role_arn() -> String {
    "arn:aws:iam::ACCOUNT_ID:role/FISRole".to_string()
}

fn default_stop_alarm_arn() -> String {
    "arn:aws:cloudwatch:*:*:alarm:*".to_string()
}

/// Analyzer that renders a CDK stack and an experiment template per scenario
pub struct CodegenAnalyzer {
    store: ScopedStore,
    renderer: StackRenderer,
    settings: AnalyzerSettings,
}

impl CodegenAnalyzer {
    pub fn new(store: ScopedStore, settings: AnalyzerSettings) -> Result<Self, CapabilityError> {
        let renderer = StackRenderer::new().map_err(|e| {
            CapabilityError::permanent("configuration", format!("invalid stack template: {}", e))
        })?;
        Ok(Self {
            store,
            renderer,
            settings,
        })
    }

    async fn load_scenario(&self, key: &str) -> Result<GeneratedScenario, CapabilityError> {
        let object = self.store.get(key).await?.ok_or_else(|| {
            CapabilityError::permanent("not_found", format!("scenario {} not found", key))
        })?;
        object
            .json()
            .map_err(|e| CapabilityError::permanent("validation", format!("malformed scenario: {}", e)))
    }
}

/// CloudFormation-compatible stack name derived from the scenario id
pub fn stack_name_for(scenario_id: &str) -> String {
    let slug: String = scenario_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let mut name = format!("chaos-{}", slug.trim_matches('-'));
    name.truncate(128);
    name
}

#[async_trait]
impl ScenarioAnalyzer for CodegenAnalyzer {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeOutput, CapabilityError> {
        let scenario = match request.scenario {
            Some(scenario) => scenario,
            None => self.load_scenario(&request.scenario_key).await?,
        };

        scenario
            .validate()
            .map_err(|e| CapabilityError::permanent("validation", e.to_string()))?;

        let services = services::extract(&scenario);
        debug!(
            "Scenario {} targets {:?}",
            scenario.scenario_id, services
        );

        let code = self
            .renderer
            .render(
                &scenario,
                &services,
                &self.settings.project_tag,
                &self.settings.environment,
            )
            .map_err(|e| CapabilityError::permanent("codegen", format!("rendering stack: {}", e)))?;
        let template = experiment::build(&scenario, &services, &self.settings);

        let code_key = keys::stack_code_key(&request.execution_id, &scenario.scenario_id);
        let template_key =
            keys::experiment_template_key(&request.execution_id, &scenario.scenario_id);

        write_once(&self.store, &code_key, code.into_bytes()).await?;
        write_json_once(&self.store, &template_key, &template).await?;
        info!(
            "Wrote artifacts for scenario {} under {}",
            scenario.scenario_id,
            keys::generated_prefix(&request.execution_id, &scenario.scenario_id)
        );

        Ok(AnalyzeOutput {
            bucket: request.bucket,
            stack_name: stack_name_for(&scenario.scenario_id),
            scenario_id: scenario.scenario_id,
            scenario_name: scenario.name,
            services: services.iter().map(|s| s.display_name().to_string()).collect(),
            code_key,
            experiment_template_key: template_key,
        })
    }
}
