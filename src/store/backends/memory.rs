//! In-memory store backend for testing

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{
    error::StoreResult,
    keys::validate_key,
    traits::ObjectStore,
    types::{content_digest, ObjectMeta, PutOutcome, StoreHealth, StoredObject},
};

/// In-memory store backend for testing
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

impl MemoryStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn make_object(key: &str, body: Vec<u8>, content_type: Option<&str>) -> StoredObject {
        StoredObject {
            meta: ObjectMeta {
                key: key.to_string(),
                size: body.len() as u64,
                last_modified: Utc::now(),
                version: content_digest(&body),
                content_type: content_type.map(str::to_string),
            },
            body,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        validate_key(key)?;
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<ObjectMeta> {
        validate_key(key)?;
        let object = Self::make_object(key, body, content_type);
        let meta = object.meta.clone();
        self.objects.write().await.insert(key.to_string(), object);
        Ok(meta)
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome> {
        validate_key(key)?;
        let mut objects = self.objects.write().await;
        if let Some(existing) = objects.get(key) {
            return Ok(PutOutcome::Exists(existing.meta.clone()));
        }
        let object = Self::make_object(key, body, content_type);
        let meta = object.meta.clone();
        objects.insert(key.to_string(), object);
        Ok(PutOutcome::Created(meta))
    }

    async fn head(&self, key: &str) -> StoreResult<Option<ObjectMeta>> {
        validate_key(key)?;
        Ok(self
            .objects
            .read()
            .await
            .get(key)
            .map(|object| object.meta.clone()))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, object)| object.meta.clone())
            .collect())
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        Ok(StoreHealth {
            healthy: true,
            backend_type: "memory".to_string(),
            latency_ms: 0,
            errors: vec![],
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
