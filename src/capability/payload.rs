//! Structured request/output payloads exchanged between stages

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scenario::GeneratedScenario;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub execution_id: String,
    pub bucket: String,
    pub template_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOutput {
    pub bucket: String,
    pub template_key: String,
    pub scenario: GeneratedScenario,
    /// Unprocessed model text, kept for operator inspection
    pub raw_text: String,
}

/// Analyzer input. The scenario may be passed inline or fetched by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub execution_id: String,
    pub bucket: String,
    pub scenario_key: String,
    #[serde(default)]
    pub scenario: Option<GeneratedScenario>,
}

impl AnalyzeRequest {
    /// Hand the generator's output forward once it has been persisted under `scenario_key`
    pub fn from_generated(
        execution_id: &str,
        output: &GenerateOutput,
        scenario_key: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            bucket: output.bucket.clone(),
            scenario_key: scenario_key.into(),
            scenario: Some(output.scenario.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeOutput {
    pub bucket: String,
    pub scenario_id: String,
    pub scenario_name: String,
    /// Target services detected in the scenario, in a stable order
    pub services: Vec<String>,
    pub code_key: String,
    pub experiment_template_key: String,
    pub stack_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub execution_id: String,
    pub bucket: String,
    pub code_key: String,
    pub stack_name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl DeployRequest {
    pub fn from_analysis(execution_id: &str, output: &AnalyzeOutput) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            bucket: output.bucket.clone(),
            code_key: output.code_key.clone(),
            stack_name: output.stack_name.clone(),
            parameters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployOperation {
    /// The deploy command applied a change
    Applied,
    /// The deploy engine reported nothing to update
    NoChange,
    /// The artifact was handed to the build-deploy pipeline
    HandedOff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployOutput {
    pub stack_name: String,
    pub operation: DeployOperation,
    /// Key the deployed or handed-off code was read from or written to
    pub artifact_key: String,
    #[serde(default)]
    pub detail: Option<String>,
}
