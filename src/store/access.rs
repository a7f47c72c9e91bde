//! Capability-access contracts
//!
//! Each component gets a [`ScopedStore`] built from a named [`CapabilityAccess`]. Reads
//! and writes outside the declared prefixes fail with `PermissionDenied` before they
//! reach the backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::error::{StoreError, StoreResult};
use super::keys::{
    CODEGEN_OUTPUT_PREFIX, EXECUTIONS_PREFIX, EXPERIMENTS_PREFIX, EXPERIMENT_LOGS_PREFIX,
    GENERATED_PREFIX, PIPELINE_RUNS_PREFIX, SCENARIOS_PREFIX, TEMPLATES_PREFIX,
};
use super::traits::ObjectStore;
use super::types::{ObjectMeta, PutOutcome, StoreHealth, StoredObject};

/// Readable and writable key prefixes granted to one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityAccess {
    pub name: String,
    #[serde(default)]
    pub read_prefixes: Vec<String>,
    #[serde(default)]
    pub write_prefixes: Vec<String>,
}

impl CapabilityAccess {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_prefixes: Vec::new(),
            write_prefixes: Vec::new(),
        }
    }

    pub fn read(mut self, prefix: impl Into<String>) -> Self {
        self.read_prefixes.push(prefix.into());
        self
    }

    pub fn write(mut self, prefix: impl Into<String>) -> Self {
        self.write_prefixes.push(prefix.into());
        self
    }

    /// Writable prefixes are implicitly readable
    pub fn can_read(&self, key: &str) -> bool {
        self.read_prefixes
            .iter()
            .chain(self.write_prefixes.iter())
            .any(|prefix| key.starts_with(prefix.as_str()))
    }

    pub fn can_write(&self, key: &str) -> bool {
        self.write_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// A listing is allowed when every key it could return is readable
    pub fn can_list(&self, prefix: &str) -> bool {
        self.read_prefixes
            .iter()
            .chain(self.write_prefixes.iter())
            .any(|granted| prefix.starts_with(granted.as_str()))
    }

    pub fn generator() -> Self {
        Self::new("generator").read(TEMPLATES_PREFIX)
    }

    pub fn analyzer() -> Self {
        Self::new("analyzer")
            .read(SCENARIOS_PREFIX)
            .write(GENERATED_PREFIX)
    }

    pub fn deployer() -> Self {
        Self::new("deployer").read(GENERATED_PREFIX)
    }

    pub fn handoff() -> Self {
        Self::new("pipeline-handoff")
            .read(GENERATED_PREFIX)
            .write(CODEGEN_OUTPUT_PREFIX)
    }

    pub fn orchestrator() -> Self {
        Self::new("orchestrator")
            .read(GENERATED_PREFIX)
            .write(SCENARIOS_PREFIX)
            .write(EXECUTIONS_PREFIX)
    }

    pub fn pipeline() -> Self {
        Self::new("pipeline")
            .read(CODEGEN_OUTPUT_PREFIX)
            .write(PIPELINE_RUNS_PREFIX)
    }

    pub fn status() -> Self {
        Self::new("status")
            .read(TEMPLATES_PREFIX)
            .read(SCENARIOS_PREFIX)
            .read(GENERATED_PREFIX)
            .read(EXECUTIONS_PREFIX)
            .read(PIPELINE_RUNS_PREFIX)
            .read(EXPERIMENTS_PREFIX)
            .read(EXPERIMENT_LOGS_PREFIX)
    }

    /// Operator access used by the CLI for seeding templates and mirroring experiments
    pub fn operator() -> Self {
        Self::new("operator")
            .write(TEMPLATES_PREFIX)
            .write(EXPERIMENTS_PREFIX)
            .write(EXPERIMENT_LOGS_PREFIX)
    }
}

/// An [`ObjectStore`] view restricted to one access contract
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn ObjectStore>,
    access: CapabilityAccess,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn ObjectStore>, access: CapabilityAccess) -> Self {
        Self { inner, access }
    }

    pub fn access(&self) -> &CapabilityAccess {
        &self.access
    }

    fn check_read(&self, key: &str) -> StoreResult<()> {
        if self.access.can_read(key) {
            Ok(())
        } else {
            warn!("{} denied read access to {}", self.access.name, key);
            Err(StoreError::permission_denied(format!(
                "{} may not read {}",
                self.access.name, key
            )))
        }
    }

    fn check_write(&self, key: &str) -> StoreResult<()> {
        if self.access.can_write(key) {
            Ok(())
        } else {
            warn!("{} denied write access to {}", self.access.name, key);
            Err(StoreError::permission_denied(format!(
                "{} may not write {}",
                self.access.name, key
            )))
        }
    }
}

#[async_trait]
impl ObjectStore for ScopedStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        self.check_read(key)?;
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<ObjectMeta> {
        self.check_write(key)?;
        self.inner.put(key, body, content_type).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome> {
        self.check_write(key)?;
        self.inner.put_if_absent(key, body, content_type).await
    }

    async fn head(&self, key: &str) -> StoreResult<Option<ObjectMeta>> {
        self.check_read(key)?;
        self.inner.head(key).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        if !self.access.can_list(prefix) {
            warn!("{} denied listing of {}", self.access.name, prefix);
            return Err(StoreError::permission_denied(format!(
                "{} may not list {}",
                self.access.name, prefix
            )));
        }
        self.inner.list(prefix).await
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backends::MemoryStore;

    #[test]
    fn test_default_contracts() {
        let generator = CapabilityAccess::generator();
        assert!(generator.can_read("templates/seed.json"));
        assert!(!generator.can_write("templates/seed.json"));
        assert!(!generator.can_read("generated/e/s/stack.ts"));

        let analyzer = CapabilityAccess::analyzer();
        assert!(analyzer.can_read("scenarios/e/s.json"));
        assert!(analyzer.can_write("generated/e/s/stack.ts"));
        assert!(!analyzer.can_write("scenarios/e/s.json"));

        let pipeline = CapabilityAccess::pipeline();
        assert!(pipeline.can_read("codegen-output/stack.ts"));
        assert!(pipeline.can_write("pipeline-runs/run-1.json"));
        assert!(!pipeline.can_read("templates/seed.json"));
    }

    #[test]
    fn test_list_requires_covering_grant() {
        let status = CapabilityAccess::status();
        assert!(status.can_list("scenarios/"));
        assert!(status.can_list("scenarios/exec-1/"));
        assert!(!status.can_list(""));
    }

    #[tokio::test]
    async fn test_scoped_store_rejects_out_of_contract_access() {
        let backend: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        backend
            .put("templates/seed.json", b"{}".to_vec(), None)
            .await
            .unwrap();

        let deployer = ScopedStore::new(backend.clone(), CapabilityAccess::deployer());
        let err = deployer.get("templates/seed.json").await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));

        let err = deployer
            .put("generated/e/s/stack.ts", vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));

        let generator = ScopedStore::new(backend, CapabilityAccess::generator());
        assert!(generator.get("templates/seed.json").await.unwrap().is_some());
    }
}
