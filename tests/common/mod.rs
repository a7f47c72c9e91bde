//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Map;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chaosforge::capability::{
    AnalyzeOutput, AnalyzeRequest, CapabilityError, DeployOperation, DeployOutput, DeployRequest,
    Deployer, GenerateOutput, GenerateRequest, ScenarioAnalyzer, ScenarioGenerator,
};
use chaosforge::scenario::GeneratedScenario;
use chaosforge::store::{
    keys, CapabilityAccess, MemoryStore, ObjectStore, ScopedStore,
};
use chaosforge::workflow::{Capabilities, Orchestrator, WorkflowDefinition};

pub const BUCKET: &str = "chaos-test-bucket";
pub const TEMPLATE_KEY: &str = "templates/ec2-failure.json";

/// Failures handed out one per call before calls start succeeding
#[derive(Default)]
pub struct Script {
    failures: Mutex<VecDeque<CapabilityError>>,
    calls: AtomicU32,
}

impl Script {
    pub fn failing_with(failures: impl IntoIterator<Item = CapabilityError>) -> Self {
        Self {
            failures: Mutex::new(failures.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<(), CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Steps observed across fakes, in call order
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn scenario(id: &str) -> GeneratedScenario {
    GeneratedScenario {
        scenario_id: id.to_string(),
        name: format!("{} scenario", id),
        category: "compute".to_string(),
        description: "Stop a random EC2 instance in the target group".to_string(),
        body: Map::new(),
    }
}

pub struct FakeGenerator {
    pub script: Script,
    pub scenario_id: String,
    pub delay: Option<Duration>,
    pub log: CallLog,
}

impl FakeGenerator {
    pub fn new(log: CallLog) -> Self {
        Self {
            script: Script::default(),
            scenario_id: "ec2-stop-instance".to_string(),
            delay: None,
            log,
        }
    }
}

#[async_trait]
impl ScenarioGenerator for FakeGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, CapabilityError> {
        self.log.lock().unwrap().push("generate".to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.next()?;
        Ok(GenerateOutput {
            bucket: request.bucket,
            template_key: request.template_key,
            scenario: scenario(&self.scenario_id),
            raw_text: "{}".to_string(),
        })
    }
}

/// Writes both artifacts under the generated prefix, like the real analyzer
pub struct FakeAnalyzer {
    pub script: Script,
    pub store: ScopedStore,
    pub log: CallLog,
}

#[async_trait]
impl ScenarioAnalyzer for FakeAnalyzer {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeOutput, CapabilityError> {
        self.log.lock().unwrap().push("analyze".to_string());
        // The scenario must already be persisted when analysis starts
        let persisted = self.store.get(&request.scenario_key).await?.ok_or_else(|| {
            CapabilityError::permanent(
                "not_found",
                format!("scenario {} not persisted", request.scenario_key),
            )
        })?;
        let scenario: GeneratedScenario = persisted
            .json()
            .map_err(|e| CapabilityError::permanent("validation", e.to_string()))?;
        self.script.next()?;

        let code_key = keys::stack_code_key(&request.execution_id, &scenario.scenario_id);
        let template_key =
            keys::experiment_template_key(&request.execution_id, &scenario.scenario_id);
        self.store
            .put(&code_key, b"export class Stack {}".to_vec(), None)
            .await?;
        self.store
            .put(&template_key, b"{\"actions\":{}}".to_vec(), None)
            .await?;

        Ok(AnalyzeOutput {
            bucket: request.bucket,
            scenario_id: scenario.scenario_id.clone(),
            scenario_name: scenario.name,
            services: vec!["ec2".to_string()],
            code_key,
            experiment_template_key: template_key,
            stack_name: format!("Chaos-{}", scenario.scenario_id),
        })
    }
}

pub struct FakeDeployer {
    pub script: Script,
    pub log: CallLog,
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutput, CapabilityError> {
        self.log.lock().unwrap().push("deploy".to_string());
        self.script.next()?;
        Ok(DeployOutput {
            stack_name: request.stack_name,
            operation: DeployOperation::Applied,
            artifact_key: request.code_key,
            detail: None,
        })
    }
}

/// An in-memory store with fakes wired the way the app wires real capabilities
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub generator: Arc<FakeGenerator>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub deployer: Arc<FakeDeployer>,
    pub log: CallLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_generator(|generator| generator)
    }

    pub fn with_generator(configure: impl FnOnce(FakeGenerator) -> FakeGenerator) -> Self {
        Self::build(configure, Script::default(), Script::default())
    }

    pub fn build(
        configure: impl FnOnce(FakeGenerator) -> FakeGenerator,
        analyzer_script: Script,
        deployer_script: Script,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let log: CallLog = Arc::default();
        let generator = configure(FakeGenerator::new(Arc::clone(&log)));
        let analyzer = FakeAnalyzer {
            script: analyzer_script,
            store: scoped(&store, CapabilityAccess::analyzer()),
            log: Arc::clone(&log),
        };
        let deployer = FakeDeployer {
            script: deployer_script,
            log: Arc::clone(&log),
        };
        Self {
            store,
            generator: Arc::new(generator),
            analyzer: Arc::new(analyzer),
            deployer: Arc::new(deployer),
            log,
        }
    }

    pub fn orchestrator(&self, definition: WorkflowDefinition) -> Orchestrator {
        let deployer: Option<Arc<dyn Deployer>> = if definition.includes_deploy() {
            Some(self.deployer.clone())
        } else {
            None
        };
        Orchestrator::new(
            definition,
            Capabilities {
                generator: self.generator.clone(),
                analyzer: self.analyzer.clone(),
                deployer,
            },
            self.scoped(CapabilityAccess::orchestrator()),
        )
        .expect("valid orchestrator")
    }

    pub fn scoped(&self, access: CapabilityAccess) -> ScopedStore {
        scoped(&self.store, access)
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn scoped(store: &Arc<MemoryStore>, access: CapabilityAccess) -> ScopedStore {
    let inner: Arc<dyn ObjectStore> = store.clone();
    ScopedStore::new(inner, access)
}

pub fn throttled() -> CapabilityError {
    CapabilityError::transient("throttled", "Rate exceeded")
}
