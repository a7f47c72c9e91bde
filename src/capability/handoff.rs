//! Deploy mode that hands generated code to the build-deploy pipeline

use async_trait::async_trait;
use tracing::info;

use super::payload::{DeployOperation, DeployOutput, DeployRequest};
use super::{CapabilityError, Deployer};
use crate::store::types::{content_digest, content_type_for_key};
use crate::store::{keys, ObjectStore, ScopedStore};

/// Copies the code artifact to the pipeline trigger key.
///
/// A new object version at the trigger key starts a pipeline run. Copying content
/// identical to what is already there creates no new version and reports `NoChange`.
pub struct PipelineHandoffDeployer {
    store: ScopedStore,
    trigger_key: String,
}

impl PipelineHandoffDeployer {
    pub fn new(store: ScopedStore, artifact_name: &str) -> Result<Self, CapabilityError> {
        let trigger_key = keys::codegen_output_key(artifact_name);
        keys::validate_key(&trigger_key)
            .map_err(|e| CapabilityError::permanent("configuration", e.to_string()))?;
        Ok(Self { store, trigger_key })
    }

    pub fn trigger_key(&self) -> &str {
        &self.trigger_key
    }
}

#[async_trait]
impl Deployer for PipelineHandoffDeployer {
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutput, CapabilityError> {
        let code = self.store.get(&request.code_key).await?.ok_or_else(|| {
            CapabilityError::permanent(
                "artifact_missing",
                format!("code artifact {} not found", request.code_key),
            )
        })?;

        let unchanged = self
            .store
            .get(&self.trigger_key)
            .await?
            .is_some_and(|current| content_digest(&current.body) == content_digest(&code.body));
        if unchanged {
            info!(
                "Pipeline source {} already holds {}",
                self.trigger_key, request.code_key
            );
            return Ok(DeployOutput {
                stack_name: request.stack_name,
                operation: DeployOperation::NoChange,
                artifact_key: self.trigger_key.clone(),
                detail: None,
            });
        }

        let meta = self
            .store
            .put(
                &self.trigger_key,
                code.body,
                content_type_for_key(&self.trigger_key),
            )
            .await?;
        info!(
            "Handed {} to the build-deploy pipeline as {} (version {})",
            request.code_key, self.trigger_key, meta.version
        );

        Ok(DeployOutput {
            stack_name: request.stack_name,
            operation: DeployOperation::HandedOff,
            artifact_key: self.trigger_key.clone(),
            detail: Some(format!("source version {}", meta.version)),
        })
    }
}
