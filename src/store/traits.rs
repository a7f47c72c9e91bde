//! Core trait definition for the template store

use async_trait::async_trait;

use super::error::StoreResult;
use super::types::{ObjectMeta, PutOutcome, StoreHealth, StoredObject};

/// Key-addressed object storage for templates and generated artifacts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, `None` when the key does not exist
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>>;

    /// Write an object, replacing any previous content
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<ObjectMeta>;

    /// Write an object only if nothing exists under the key yet
    async fn put_if_absent(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome>;

    /// Fetch only the metadata of an object
    async fn head(&self, key: &str) -> StoreResult<Option<ObjectMeta>>;

    /// List objects whose key starts with `prefix`, ordered by key
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>>;

    /// Check the health of the backend
    async fn health_check(&self) -> StoreResult<StoreHealth>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}
