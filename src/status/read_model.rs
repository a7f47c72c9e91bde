//! Read-only views over scenarios, executions, pipeline runs and experiments
//!
//! Nothing here writes to the store or touches orchestration state. Errors go back to
//! the caller as they are.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::experiments::{ExperimentDetail, ExperimentRecord, ExperimentSource};
use crate::error::{ChaosError, ErrorCode};
use crate::pipeline::PipelineRun;
use crate::scenario::GeneratedScenario;
use crate::store::{keys, ObjectMeta, ObjectStore, ScopedStore, StoreHealth};
use crate::workflow::{ExecutionSummary, WorkflowExecution};

/// Default and maximum length of the executions listing
pub const MAX_EXECUTIONS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario_id: String,
    pub execution_id: String,
    pub name: String,
    pub category: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDetail {
    pub scenario_id: String,
    pub execution_id: String,
    pub scenario: GeneratedScenario,
    /// Infrastructure code generated from the scenario, once analysis ran
    pub generated_code: Option<String>,
    pub experiment_template: Option<Value>,
    pub last_modified: DateTime<Utc>,
}

pub struct StatusService {
    store: ScopedStore,
    experiments: Arc<dyn ExperimentSource>,
}

impl StatusService {
    /// `store` must carry the status access contract
    pub fn new(store: ScopedStore, experiments: Arc<dyn ExperimentSource>) -> Self {
        Self { store, experiments }
    }

    /// Scenario keys, newest first
    async fn scenario_objects(&self) -> Result<Vec<ObjectMeta>, ChaosError> {
        let mut metas: Vec<ObjectMeta> = self
            .store
            .list(keys::SCENARIOS_PREFIX)
            .await?
            .into_iter()
            .filter(|meta| keys::parse_scenario_key(&meta.key).is_some())
            .collect();
        metas.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(metas)
    }

    pub async fn list_scenarios(&self) -> Result<Vec<ScenarioSummary>, ChaosError> {
        let mut summaries = Vec::new();
        for meta in self.scenario_objects().await? {
            let Some((execution_id, scenario_id)) = keys::parse_scenario_key(&meta.key) else {
                continue;
            };
            let Some(object) = self.store.get(&meta.key).await? else {
                continue;
            };
            match object.json::<GeneratedScenario>() {
                Ok(scenario) => summaries.push(ScenarioSummary {
                    scenario_id: scenario_id.to_string(),
                    execution_id: execution_id.to_string(),
                    name: scenario.name,
                    category: scenario.category,
                    last_modified: meta.last_modified,
                }),
                Err(e) => warn!("Skipping unreadable scenario {}: {}", meta.key, e),
            }
        }
        Ok(summaries)
    }

    /// The most recent scenario with this id, with its generated artifacts
    pub async fn get_scenario(&self, scenario_id: &str) -> Result<ScenarioDetail, ChaosError> {
        let meta = self
            .scenario_objects()
            .await?
            .into_iter()
            .find(|meta| {
                keys::parse_scenario_key(&meta.key).map(|(_, id)| id) == Some(scenario_id)
            })
            .ok_or_else(|| not_found("scenario", scenario_id))?;
        let Some((execution_id, _)) = keys::parse_scenario_key(&meta.key) else {
            return Err(not_found("scenario", scenario_id));
        };

        let scenario: GeneratedScenario = self
            .store
            .get(&meta.key)
            .await?
            .ok_or_else(|| not_found("scenario", scenario_id))?
            .json()?;

        let generated_code = match self
            .store
            .get(&keys::stack_code_key(execution_id, scenario_id))
            .await?
        {
            Some(object) => Some(object.text().map_err(|e| {
                ChaosError::other(format!("generated code is not UTF-8: {}", e))
            })?),
            None => None,
        };
        let experiment_template = match self
            .store
            .get(&keys::experiment_template_key(execution_id, scenario_id))
            .await?
        {
            Some(object) => Some(object.json()?),
            None => None,
        };

        Ok(ScenarioDetail {
            scenario_id: scenario_id.to_string(),
            execution_id: execution_id.to_string(),
            scenario,
            generated_code,
            experiment_template,
            last_modified: meta.last_modified,
        })
    }

    /// Executions newest first, at most `limit` (capped at [`MAX_EXECUTIONS`])
    pub async fn list_executions(&self, limit: usize) -> Result<Vec<ExecutionSummary>, ChaosError> {
        let mut executions: Vec<ExecutionSummary> = self
            .load_all::<WorkflowExecution>(keys::EXECUTIONS_PREFIX)
            .await?
            .iter()
            .map(WorkflowExecution::summary)
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        executions.truncate(limit.min(MAX_EXECUTIONS));
        Ok(executions)
    }

    pub async fn get_execution(&self, id: &str) -> Result<WorkflowExecution, ChaosError> {
        if !keys::is_safe_segment(id) {
            return Err(invalid_id("execution", id));
        }
        Ok(self
            .store
            .get(&keys::execution_key(id))
            .await?
            .ok_or_else(|| not_found("execution", id))?
            .json()?)
    }

    /// Pipeline runs newest first
    pub async fn list_pipeline_runs(&self, limit: usize) -> Result<Vec<PipelineRun>, ChaosError> {
        let mut runs = self
            .load_all::<PipelineRun>(keys::PIPELINE_RUNS_PREFIX)
            .await?;
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    pub async fn list_experiments(&self) -> Result<Vec<ExperimentRecord>, ChaosError> {
        self.experiments.list().await
    }

    pub async fn get_experiment(&self, id: &str) -> Result<ExperimentDetail, ChaosError> {
        self.experiments.get(id).await
    }

    pub async fn health(&self) -> Result<StoreHealth, ChaosError> {
        Ok(self.store.health_check().await?)
    }

    /// Fetch and decode every JSON record under `prefix` concurrently; unreadable ones are skipped
    async fn load_all<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, ChaosError> {
        let metas = self.store.list(prefix).await?;
        let fetched = join_all(metas.iter().map(|meta| self.store.get(&meta.key))).await;

        let mut records = Vec::with_capacity(metas.len());
        for (meta, result) in metas.iter().zip(fetched) {
            let Some(object) = result? else {
                continue;
            };
            match object.json::<T>() {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record {}: {}", meta.key, e),
            }
        }
        Ok(records)
    }
}

fn not_found(kind: &str, id: &str) -> ChaosError {
    ChaosError::store_with_code(
        ErrorCode::STORE_NOT_FOUND,
        format!("{} {} not found", kind, id),
        None,
    )
}

fn invalid_id(kind: &str, id: &str) -> ChaosError {
    ChaosError::validation_with_code(
        ErrorCode::VALIDATION_INVALID_IDENTIFIER,
        format!("invalid {} id '{}'", kind, id),
        Some("id".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::experiments::StoreExperimentSource;
    use crate::store::{CapabilityAccess, MemoryStore};
    use chrono::Duration;

    fn service(backend: &Arc<MemoryStore>) -> StatusService {
        let inner: Arc<dyn ObjectStore> = backend.clone();
        let scoped = || ScopedStore::new(Arc::clone(&inner), CapabilityAccess::status());
        StatusService::new(scoped(), Arc::new(StoreExperimentSource::new(scoped())))
    }

    #[tokio::test]
    async fn test_pipeline_runs_newest_first_skipping_unreadable() {
        let backend = Arc::new(MemoryStore::new());
        let now = Utc::now();
        for age in [3, 1, 2] {
            let mut run = PipelineRun::new(keys::codegen_output_key("stack.ts"));
            run.run_id = format!("run-{}", age);
            run.started_at = now - Duration::minutes(age);
            backend
                .put(
                    &keys::pipeline_run_key(&run.run_id),
                    serde_json::to_vec(&run).unwrap(),
                    None,
                )
                .await
                .unwrap();
        }
        backend
            .put(&keys::pipeline_run_key("run-torn"), b"{\"run_id\":".to_vec(), None)
            .await
            .unwrap();

        let runs = service(&backend).list_pipeline_runs(2).await.unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["run-1", "run-2"]);
    }

    #[tokio::test]
    async fn test_get_execution_errors() {
        let backend = Arc::new(MemoryStore::new());
        let status = service(&backend);

        let missing = status.get_execution("exec-missing").await.unwrap_err();
        assert!(missing.is_not_found());

        let invalid = status.get_execution("../templates").await.unwrap_err();
        assert_eq!(invalid.code(), ErrorCode::VALIDATION_INVALID_IDENTIFIER);

        assert!(status.list_executions(10).await.unwrap().is_empty());
    }
}
