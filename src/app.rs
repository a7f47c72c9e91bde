//! Composition root: builds every component from configuration.
//!
//! Each component receives its own [`ScopedStore`] with the access contract it
//! needs, so the wiring below is the one place where permissions are granted.

use std::sync::Arc;
use tracing::info;

use crate::capability::{
    CodegenAnalyzer, CommandDeployer, Deployer, ModelScenarioGenerator, PipelineHandoffDeployer,
};
use crate::config::{ChaosConfig, DeployMode};
use crate::error::{ChaosError, ErrorCode};
use crate::pipeline::PipelineExecutor;
use crate::scenario::ScenarioTemplate;
use crate::status::{mirror_experiment, ExperimentLogEntry, ExperimentRecord, StatusService, StoreExperimentSource};
use crate::store::{
    keys, write_once, CapabilityAccess, ObjectMeta, ObjectStore, ScopedStore, StoreFactory,
    WriteOnce,
};
use crate::subprocess::{ProcessRunner, TokioProcessRunner};
use crate::workflow::{Capabilities, ExecutionInput, Orchestrator};

pub struct App {
    config: ChaosConfig,
    store: Arc<dyn ObjectStore>,
    runner: Arc<dyn ProcessRunner>,
}

impl App {
    /// Open the configured store and use real subprocesses
    pub async fn new(config: ChaosConfig) -> Result<Self, ChaosError> {
        let store = StoreFactory::from_config(&config.store).await?;
        info!(
            "Using {} store, bucket {}",
            store.backend_name(),
            config.store.bucket
        );
        Ok(Self::with_parts(config, store, Arc::new(TokioProcessRunner)))
    }

    pub fn with_parts(
        config: ChaosConfig,
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            store,
            runner,
        }
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    pub fn scoped(&self, access: CapabilityAccess) -> ScopedStore {
        ScopedStore::new(Arc::clone(&self.store), access)
    }

    /// Execution input for a template name or full template key
    pub fn execution_input(&self, template: &str) -> ExecutionInput {
        let key = if template.starts_with(keys::TEMPLATES_PREFIX) {
            template.to_string()
        } else {
            keys::template_key(template)
        };
        ExecutionInput::new(self.config.store.bucket.clone(), key)
    }

    pub fn deployer(&self) -> Result<Arc<dyn Deployer>, ChaosError> {
        let deployer: Arc<dyn Deployer> = match self.config.deploy.mode {
            DeployMode::Direct => Arc::new(CommandDeployer::new(
                self.scoped(CapabilityAccess::deployer()),
                Arc::clone(&self.runner),
                self.config.deploy.commands.clone(),
            )?),
            DeployMode::Pipeline => Arc::new(PipelineHandoffDeployer::new(
                self.scoped(CapabilityAccess::handoff()),
                &self.config.pipeline.artifact_name,
            )?),
        };
        Ok(deployer)
    }

    pub fn orchestrator(&self, include_deploy: bool) -> Result<Orchestrator, ChaosError> {
        let generator = ModelScenarioGenerator::new(
            self.scoped(CapabilityAccess::generator()),
            self.config.generator.clone(),
        )?;
        let analyzer = CodegenAnalyzer::new(
            self.scoped(CapabilityAccess::analyzer()),
            self.config.analyzer.clone(),
        )?;
        let deployer = if include_deploy {
            Some(self.deployer()?)
        } else {
            None
        };

        Orchestrator::new(
            self.config.workflow_definition(include_deploy),
            Capabilities {
                generator: Arc::new(generator),
                analyzer: Arc::new(analyzer),
                deployer,
            },
            self.scoped(CapabilityAccess::orchestrator()),
        )
    }

    pub fn pipeline(&self) -> Result<Arc<PipelineExecutor>, ChaosError> {
        let executor = PipelineExecutor::new(
            self.scoped(CapabilityAccess::pipeline()),
            Arc::clone(&self.runner),
            self.config.pipeline.clone(),
        )?;
        Ok(Arc::new(executor))
    }

    pub fn status_service(&self) -> Arc<StatusService> {
        let experiments = StoreExperimentSource::new(self.scoped(CapabilityAccess::status()));
        Arc::new(StatusService::new(
            self.scoped(CapabilityAccess::status()),
            Arc::new(experiments),
        ))
    }

    /// Seed a template. Templates are immutable unless `replace` is set.
    pub async fn upload_template(
        &self,
        name: &str,
        body: Vec<u8>,
        replace: bool,
    ) -> Result<ObjectMeta, ChaosError> {
        if !keys::is_safe_segment(name) {
            return Err(ChaosError::validation_with_code(
                ErrorCode::VALIDATION_INVALID_IDENTIFIER,
                format!("invalid template name '{}'", name),
                Some("name".to_string()),
            ));
        }
        ScenarioTemplate::from_slice(&body).map_err(|reason| {
            ChaosError::validation_with_code(
                ErrorCode::VALIDATION_GENERIC,
                format!("template {} rejected: {}", name, reason),
                Some("template".to_string()),
            )
        })?;

        let store = self.scoped(CapabilityAccess::operator());
        let key = keys::template_key(name);
        if replace {
            return Ok(store.put(&key, body, Some("application/json")).await?);
        }
        let (outcome, meta) = write_once(&store, &key, body).await?;
        if outcome == WriteOnce::AlreadyPresent {
            info!("Template {} already present with identical content", key);
        }
        Ok(meta)
    }

    pub async fn import_experiment(
        &self,
        record: &ExperimentRecord,
        logs: &[ExperimentLogEntry],
    ) -> Result<(), ChaosError> {
        mirror_experiment(&self.scoped(CapabilityAccess::operator()), record, logs).await
    }
}
