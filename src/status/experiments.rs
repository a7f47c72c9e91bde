//! Fault-injection experiment records
//!
//! Experiments are owned by the external fault-injection service. Their records are
//! mirrored into the store (`experiments/<id>.json`, logs as JSON lines under
//! `experiment-logs/<id>.jsonl`) and only ever read here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{ChaosError, ErrorCode};
use crate::store::{keys, put_json, ObjectStore, ScopedStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentState {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub state: ExperimentState,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub experiment_template_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDetail {
    #[serde(flatten)]
    pub record: ExperimentRecord,
    #[serde(default)]
    pub logs: Vec<ExperimentLogEntry>,
}

/// Where experiment records are observed from
#[async_trait]
pub trait ExperimentSource: Send + Sync {
    /// Newest first
    async fn list(&self) -> Result<Vec<ExperimentRecord>, ChaosError>;

    async fn get(&self, id: &str) -> Result<ExperimentDetail, ChaosError>;
}

pub struct StoreExperimentSource {
    store: ScopedStore,
}

impl StoreExperimentSource {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    async fn logs(&self, id: &str) -> Result<Vec<ExperimentLogEntry>, ChaosError> {
        let Some(object) = self.store.get(&keys::experiment_logs_key(id)).await? else {
            return Ok(Vec::new());
        };
        let text = object
            .text()
            .map_err(|e| ChaosError::other(format!("experiment log for {} is not UTF-8: {}", id, e)))?;
        let mut entries = Vec::new();
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExperimentLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping log line {} of {}: {}", number + 1, id, e),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl ExperimentSource for StoreExperimentSource {
    async fn list(&self) -> Result<Vec<ExperimentRecord>, ChaosError> {
        let mut records = Vec::new();
        for meta in self.store.list(keys::EXPERIMENTS_PREFIX).await? {
            let Some(object) = self.store.get(&meta.key).await? else {
                continue;
            };
            match object.json::<ExperimentRecord>() {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable experiment record {}: {}", meta.key, e),
            }
        }
        records.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<ExperimentDetail, ChaosError> {
        if !keys::is_safe_segment(id) {
            return Err(ChaosError::validation_with_code(
                ErrorCode::VALIDATION_INVALID_IDENTIFIER,
                format!("invalid experiment id '{}'", id),
                Some("id".to_string()),
            ));
        }
        let key = keys::experiment_key(id);
        let object = self.store.get(&key).await?.ok_or_else(|| {
            ChaosError::store_with_code(
                ErrorCode::STORE_NOT_FOUND,
                format!("experiment {} not found", id),
                Some(key.clone()),
            )
        })?;
        Ok(ExperimentDetail {
            record: object.json()?,
            logs: self.logs(id).await?,
        })
    }
}

/// Mirror an experiment and its log into the store.
///
/// `store` needs write access to the experiment prefixes; the log replaces any
/// previously mirrored log.
pub async fn mirror_experiment(
    store: &dyn ObjectStore,
    record: &ExperimentRecord,
    logs: &[ExperimentLogEntry],
) -> Result<(), ChaosError> {
    if !keys::is_safe_segment(&record.id) {
        return Err(ChaosError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_IDENTIFIER,
            format!("invalid experiment id '{}'", record.id),
            Some("id".to_string()),
        ));
    }
    put_json(store, &keys::experiment_key(&record.id), record).await?;
    if !logs.is_empty() {
        let mut body = Vec::new();
        for entry in logs {
            serde_json::to_writer(&mut body, entry)?;
            body.push(b'\n');
        }
        store
            .put(
                &keys::experiment_logs_key(&record.id),
                body,
                Some("application/x-ndjson"),
            )
            .await?;
    }
    Ok(())
}
