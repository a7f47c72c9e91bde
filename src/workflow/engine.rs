//! Workflow orchestrator
//!
//! Each execution runs as its own tokio task and walks the definition's steps in
//! order. A step invocation is spawned and raced against the execution deadline;
//! when the deadline wins the call keeps running detached and whatever it returns
//! is dropped. Store writes made by the orchestrator itself check the deadline
//! first, so a detached call never persists anything. Backoff sleeps are raced
//! against the same deadline.

use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::definition::WorkflowDefinition;
use super::execution::{
    ArtifactKind, AttemptOutcome, ErrorInfo, ExecutionId, ExecutionInput, ExecutionSummary,
    WorkflowExecution,
};
use super::registry::ExecutionRegistry;
use super::state::{StepEvent, StepKind, WorkflowState};
use crate::capability::{
    AnalyzeOutput, AnalyzeRequest, CapabilityError, DeployOperation, DeployOutput, DeployRequest,
    Deployer, FailureClass, GenerateOutput, GenerateRequest, ScenarioAnalyzer, ScenarioGenerator,
};
use crate::error::{ChaosError, ErrorCode};
use crate::store::keys::{self, is_safe_segment};
use crate::store::{write_json_once, ObjectStore, ScopedStore};

/// The capabilities an orchestrator drives
#[derive(Clone)]
pub struct Capabilities {
    pub generator: Arc<dyn ScenarioGenerator>,
    pub analyzer: Arc<dyn ScenarioAnalyzer>,
    pub deployer: Option<Arc<dyn Deployer>>,
}

enum TaskOutcome<T> {
    Completed(T),
    Failed(ErrorInfo),
    TimedOut { attempts: u32 },
}

struct Inner {
    definition: WorkflowDefinition,
    capabilities: Capabilities,
    store: ScopedStore,
    registry: ExecutionRegistry,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// `store` must carry the orchestrator access contract
    pub fn new(
        definition: WorkflowDefinition,
        capabilities: Capabilities,
        store: ScopedStore,
    ) -> Result<Self, ChaosError> {
        definition.validate()?;
        if definition.includes_deploy() && capabilities.deployer.is_none() {
            return Err(ChaosError::workflow_with_code(
                ErrorCode::WORKFLOW_INVALID_DEFINITION,
                format!("workflow '{}' has a Deploy step but no deployer", definition.name),
                None,
            ));
        }
        let registry = ExecutionRegistry::new(store.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                definition,
                capabilities,
                store,
                registry,
            }),
        })
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.inner.definition
    }

    /// Start an execution in the background and return its id
    pub async fn start(&self, input: ExecutionInput) -> Result<ExecutionId, ChaosError> {
        if input.bucket.trim().is_empty() {
            return Err(ChaosError::validation_with_code(
                ErrorCode::VALIDATION_MISSING_FIELD,
                "bucket is required",
                Some("bucket".to_string()),
            ));
        }
        keys::validate_key(&input.template_key).map_err(|e| {
            ChaosError::validation_with_code(
                ErrorCode::VALIDATION_GENERIC,
                e.to_string(),
                Some("template_key".to_string()),
            )
        })?;

        let id = ExecutionId::generate();
        let execution = WorkflowExecution::new(
            id.clone(),
            &self.inner.definition,
            input.clone(),
            chrono::Utc::now(),
        );
        info!(
            "Starting execution {} ({}) from {}",
            id, execution.name, input.template_key
        );
        self.inner.registry.insert(execution).await;

        let this = self.clone();
        let span = info_span!("execution", id = %id);
        let driven = id.clone();
        tokio::spawn(async move { this.drive(driven, input).await }.instrument(span));
        Ok(id)
    }

    pub async fn get_status(&self, id: &ExecutionId) -> Result<ExecutionSummary, ChaosError> {
        Ok(self.inner.registry.get(id).await?.summary())
    }

    /// Full record of an execution
    pub async fn describe(&self, id: &ExecutionId) -> Result<WorkflowExecution, ChaosError> {
        self.inner.registry.get(id).await
    }

    /// Wait for an execution to reach a terminal status
    pub async fn wait(&self, id: &ExecutionId) -> Result<WorkflowExecution, ChaosError> {
        self.inner.registry.wait(id).await
    }

    /// Start an execution and wait for it
    pub async fn run(&self, input: ExecutionInput) -> Result<WorkflowExecution, ChaosError> {
        let id = self.start(input).await?;
        self.wait(&id).await
    }

    pub async fn list_executions(&self) -> Result<Vec<ExecutionSummary>, ChaosError> {
        Ok(self
            .inner
            .registry
            .list()
            .await?
            .iter()
            .map(WorkflowExecution::summary)
            .collect())
    }

    async fn drive(self, id: ExecutionId, input: ExecutionInput) {
        let definition = &self.inner.definition;
        let deadline = Instant::now() + definition.timeout;
        let mut state = definition
            .first_step()
            .map(WorkflowState::from)
            .unwrap_or(WorkflowState::Failed);
        let mut output = Map::new();
        let mut generated: Option<(GenerateOutput, String)> = None;
        let mut analyzed: Option<AnalyzeOutput> = None;

        while let Some(step) = state.step() {
            let event = match step {
                StepKind::GenerateScenario => {
                    match self.generate(&id, &input, deadline).await {
                        TaskOutcome::Completed((out, key)) => {
                            output.insert(
                                "scenario".into(),
                                json!({
                                    "scenario_key": key,
                                    "scenario_id": out.scenario.scenario_id,
                                    "name": out.scenario.name,
                                }),
                            );
                            self.link(&id, ArtifactKind::Scenario, &key).await;
                            generated = Some((out, key));
                            Ok(())
                        }
                        other => Err(other.drop_value()),
                    }
                }
                StepKind::AnalyzeScenario => {
                    let outcome = match generated.as_ref() {
                        Some((out, key)) => {
                            let request =
                                AnalyzeRequest::from_generated(id.as_str(), out, key.clone());
                            self.analyze(&id, request, deadline).await
                        }
                        None => TaskOutcome::Failed(ErrorInfo::internal(
                            step,
                            "AnalyzeScenario reached without a persisted scenario",
                        )),
                    };
                    match outcome {
                        TaskOutcome::Completed(analysis) => {
                            self.link(&id, ArtifactKind::StackCode, &analysis.code_key)
                                .await;
                            self.link(
                                &id,
                                ArtifactKind::ExperimentTemplate,
                                &analysis.experiment_template_key,
                            )
                            .await;
                            output.insert("analysis".into(), to_value(&analysis));
                            analyzed = Some(analysis);
                            Ok(())
                        }
                        other => Err(other.drop_value()),
                    }
                }
                StepKind::Deploy => {
                    let outcome = match analyzed.as_ref() {
                        Some(analysis) => {
                            let mut request = DeployRequest::from_analysis(id.as_str(), analysis);
                            request.parameters = input.parameters.clone();
                            self.deploy(&id, request, deadline).await
                        }
                        None => TaskOutcome::Failed(ErrorInfo::internal(
                            step,
                            "Deploy reached without analysis output",
                        )),
                    };
                    match outcome {
                        TaskOutcome::Completed(deployment) => {
                            if deployment.operation == DeployOperation::HandedOff {
                                self.link(&id, ArtifactKind::PipelineSource, &deployment.artifact_key)
                                    .await;
                            }
                            output.insert("deployment".into(), to_value(&deployment));
                            Ok(())
                        }
                        other => Err(other.drop_value()),
                    }
                }
            };

            let (event, error) = match event {
                Ok(()) => (StepEvent::Completed, None),
                Err(TaskOutcome::Failed(info)) => {
                    error!(
                        "Step {} failed after {} attempt(s): {}: {}",
                        step, info.attempts, info.category, info.message
                    );
                    (StepEvent::Failed, Some(info))
                }
                Err(TaskOutcome::TimedOut { attempts }) => {
                    warn!(
                        "Execution {} exceeded its {:?} timeout in {}",
                        id, definition.timeout, step
                    );
                    let info = ErrorInfo {
                        step,
                        class: FailureClass::Transient,
                        category: "execution_timeout".to_string(),
                        message: format!(
                            "execution exceeded timeout of {:?}",
                            definition.timeout
                        ),
                        attempts,
                    };
                    (StepEvent::DeadlineExceeded, Some(info))
                }
                Err(TaskOutcome::Completed(())) => (StepEvent::Completed, None),
            };

            let snapshot_output = Value::Object(output.clone());
            let updated = self
                .inner
                .registry
                .update(&id, |execution| {
                    if let Some(info) = error {
                        execution.error = Some(info);
                    }
                    execution.output = Some(snapshot_output);
                    if let Err(e) = execution.transition(event, definition) {
                        error!("Rejected transition for {}: {}", execution.id, e);
                    }
                })
                .await;
            let next = match updated {
                Some(execution) => execution.state,
                None => {
                    error!("Execution {} vanished from the registry", id);
                    return;
                }
            };
            if next == state {
                error!("Execution {} made no progress from {}; abandoning it", id, state);
                return;
            }
            state = next;
            debug!("Execution {} is now in {}", id, state);
        }

        info!("Execution {} finished: {}", id, state.status());
    }

    async fn link(&self, id: &ExecutionId, kind: ArtifactKind, key: &str) {
        self.inner
            .registry
            .update(id, |execution| execution.link_artifact(kind, key))
            .await;
    }

    async fn generate(
        &self,
        id: &ExecutionId,
        input: &ExecutionInput,
        deadline: Instant,
    ) -> TaskOutcome<(GenerateOutput, String)> {
        let generator = Arc::clone(&self.inner.capabilities.generator);
        let store = self.inner.store.clone();
        let request = GenerateRequest {
            execution_id: id.to_string(),
            bucket: input.bucket.clone(),
            template_key: input.template_key.clone(),
        };
        self.run_task(id, StepKind::GenerateScenario, deadline, move || {
            let generator = Arc::clone(&generator);
            let store = store.clone();
            let request = request.clone();
            async move {
                let execution_id = request.execution_id.clone();
                let output = generator.generate(request).await?;
                let scenario_id = &output.scenario.scenario_id;
                if !is_safe_segment(scenario_id) {
                    return Err(CapabilityError::permanent(
                        "validation",
                        format!("scenario id '{}' is not a valid key segment", scenario_id),
                    ));
                }
                // Only a successful attempt inside the deadline reaches the store.
                // A call abandoned on timeout keeps running detached and must not
                // write behind the terminal record.
                if Instant::now() >= deadline {
                    return Err(CapabilityError::transient(
                        "execution_timeout",
                        "generation finished after the execution deadline",
                    ));
                }
                let key = keys::scenario_key(&execution_id, scenario_id);
                write_json_once(&store, &key, &output.scenario).await?;
                Ok((output, key))
            }
        })
        .await
    }

    async fn analyze(
        &self,
        id: &ExecutionId,
        request: AnalyzeRequest,
        deadline: Instant,
    ) -> TaskOutcome<AnalyzeOutput> {
        let analyzer = Arc::clone(&self.inner.capabilities.analyzer);
        let store = self.inner.store.clone();
        self.run_task(id, StepKind::AnalyzeScenario, deadline, move || {
            let analyzer = Arc::clone(&analyzer);
            let store = store.clone();
            let request = request.clone();
            async move {
                let output = analyzer.analyze(request).await?;
                for key in [&output.code_key, &output.experiment_template_key] {
                    if store.head(key).await?.is_none() {
                        return Err(CapabilityError::transient(
                            "artifact_not_visible",
                            format!("analyzer reported {} but it is not in the store", key),
                        ));
                    }
                }
                Ok(output)
            }
        })
        .await
    }

    async fn deploy(
        &self,
        id: &ExecutionId,
        request: DeployRequest,
        deadline: Instant,
    ) -> TaskOutcome<DeployOutput> {
        let Some(deployer) = self.inner.capabilities.deployer.clone() else {
            return TaskOutcome::Failed(ErrorInfo {
                step: StepKind::Deploy,
                class: FailureClass::Permanent,
                category: "configuration".to_string(),
                message: "no deployer configured".to_string(),
                attempts: 0,
            });
        };
        self.run_task(id, StepKind::Deploy, deadline, move || {
            let deployer = Arc::clone(&deployer);
            let request = request.clone();
            async move { deployer.deploy(request).await }
        })
        .await
    }

    /// Run one task state: invoke, retry transient failures, respect the deadline
    async fn run_task<T, F, Fut>(
        &self,
        id: &ExecutionId,
        step: StepKind,
        deadline: Instant,
        call: F,
    ) -> TaskOutcome<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>> + Send + 'static,
    {
        let policy = &self.inner.definition.retry;
        let registry = &self.inner.registry;
        let mut attempt = 0;

        loop {
            if Instant::now() >= deadline {
                return TaskOutcome::TimedOut { attempts: attempt };
            }
            attempt += 1;
            registry
                .update(id, |execution| execution.begin_attempt(step, attempt))
                .await;
            debug!("{} attempt {}/{}", step, attempt, policy.max_attempts);

            let mut handle = tokio::spawn(call());
            let joined = tokio::select! {
                biased;
                joined = &mut handle => joined,
                _ = sleep_until(deadline) => {
                    // Dropping the handle detaches the in-flight call
                    registry
                        .update(id, |execution| execution.finish_attempt(step, AttemptOutcome::Abandoned))
                        .await;
                    return TaskOutcome::TimedOut { attempts: attempt };
                }
            };
            let result = joined.unwrap_or_else(|e| {
                Err(CapabilityError::permanent(
                    "internal",
                    format!("{} task aborted: {}", step, e),
                ))
            });

            let err = match result {
                Ok(value) => {
                    registry
                        .update(id, |execution| {
                            execution.finish_attempt(step, AttemptOutcome::Succeeded)
                        })
                        .await;
                    return TaskOutcome::Completed(value);
                }
                Err(err) => err,
            };

            registry
                .update(id, |execution| {
                    execution.finish_attempt(
                        step,
                        AttemptOutcome::Failed {
                            class: err.class,
                            category: err.category.clone(),
                            message: err.message.clone(),
                        },
                    )
                })
                .await;

            if !err.is_transient() || !policy.allows_retry_after(attempt) {
                return TaskOutcome::Failed(ErrorInfo::from_capability(step, &err, attempt));
            }

            let delay = policy.delay_after(attempt);
            info!(
                "Retrying {} (attempt {}/{}) after {:?}: {}",
                step,
                attempt + 1,
                policy.max_attempts,
                delay,
                err
            );
            tokio::select! {
                biased;
                _ = sleep_until(deadline) => return TaskOutcome::TimedOut { attempts: attempt },
                _ = sleep(delay) => {}
            }
        }
    }
}

impl<T> TaskOutcome<T> {
    fn drop_value(self) -> TaskOutcome<()> {
        match self {
            TaskOutcome::Completed(_) => TaskOutcome::Completed(()),
            TaskOutcome::Failed(info) => TaskOutcome::Failed(info),
            TaskOutcome::TimedOut { attempts } => TaskOutcome::TimedOut { attempts },
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
