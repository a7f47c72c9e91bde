//! Execution registry
//!
//! Holds the live record of every execution started by this process and mirrors
//! each change to `executions/<id>.json` in the store. Records persisted by earlier
//! processes are still readable through the store.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

use super::execution::{ExecutionId, WorkflowExecution};
use super::state::ExecutionStatus;
use crate::error::{ChaosError, ErrorCode};
use crate::store::{keys, put_json, ObjectStore, ScopedStore};

struct Entry {
    execution: WorkflowExecution,
    status_tx: watch::Sender<ExecutionStatus>,
}

#[derive(Clone)]
pub struct ExecutionRegistry {
    entries: Arc<RwLock<HashMap<ExecutionId, Entry>>>,
    store: ScopedStore,
}

impl ExecutionRegistry {
    pub fn new(store: ScopedStore) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            store,
        }
    }

    pub async fn insert(&self, execution: WorkflowExecution) {
        let (status_tx, _) = watch::channel(execution.status);
        let id = execution.id.clone();
        let snapshot = execution.clone();
        self.entries.write().await.insert(
            id,
            Entry {
                execution,
                status_tx,
            },
        );
        self.persist(&snapshot).await;
    }

    /// Mutate a live record and persist the result
    pub async fn update<F>(&self, id: &ExecutionId, mutate: F) -> Option<WorkflowExecution>
    where
        F: FnOnce(&mut WorkflowExecution),
    {
        let snapshot = {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(id)?;
            mutate(&mut entry.execution);
            entry.status_tx.send_replace(entry.execution.status);
            entry.execution.clone()
        };
        self.persist(&snapshot).await;
        Some(snapshot)
    }

    /// Persistence failures are logged; the live record stays authoritative
    async fn persist(&self, execution: &WorkflowExecution) {
        let key = keys::execution_key(execution.id.as_str());
        match put_json(&self.store, &key, execution).await {
            Ok(_) => debug!("Persisted {} ({})", key, execution.status),
            Err(e) => warn!("Failed to persist execution record {}: {}", key, e),
        }
    }

    pub async fn get(&self, id: &ExecutionId) -> Result<WorkflowExecution, ChaosError> {
        if let Some(entry) = self.entries.read().await.get(id) {
            return Ok(entry.execution.clone());
        }
        self.load(id).await
    }

    async fn load(&self, id: &ExecutionId) -> Result<WorkflowExecution, ChaosError> {
        let key = keys::execution_key(id.as_str());
        let object = self
            .store
            .get(&key)
            .await
            .map_err(ChaosError::from)?
            .ok_or_else(|| {
                ChaosError::workflow_with_code(
                    ErrorCode::WORKFLOW_NOT_FOUND,
                    format!("execution {} not found", id),
                    Some(id.to_string()),
                )
            })?;
        Ok(object.json()?)
    }

    /// Resolve once the execution reaches a terminal status
    pub async fn wait(&self, id: &ExecutionId) -> Result<WorkflowExecution, ChaosError> {
        let receiver = {
            let entries = self.entries.read().await;
            entries.get(id).map(|entry| entry.status_tx.subscribe())
        };
        let Some(mut receiver) = receiver else {
            // Not live in this process; a persisted record is as final as it gets
            return self.load(id).await;
        };
        // The sender lives as long as the entry, which is never removed
        let _ = receiver.wait_for(|status| status.is_terminal()).await;
        self.get(id).await
    }

    /// Live and persisted executions, newest first
    pub async fn list(&self) -> Result<Vec<WorkflowExecution>, ChaosError> {
        let mut by_id: HashMap<ExecutionId, WorkflowExecution> = HashMap::new();
        for meta in self
            .store
            .list(keys::EXECUTIONS_PREFIX)
            .await
            .map_err(ChaosError::from)?
        {
            match self.store.get(&meta.key).await {
                Ok(Some(object)) => match object.json::<WorkflowExecution>() {
                    Ok(execution) => {
                        by_id.insert(execution.id.clone(), execution);
                    }
                    Err(e) => warn!("Skipping unreadable execution record {}: {}", meta.key, e),
                },
                Ok(None) => {}
                Err(e) => warn!("Failed to read {}: {}", meta.key, e),
            }
        }
        for (id, entry) in self.entries.read().await.iter() {
            by_id.insert(id.clone(), entry.execution.clone());
        }

        let mut executions: Vec<_> = by_id.into_values().collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(executions)
    }
}
