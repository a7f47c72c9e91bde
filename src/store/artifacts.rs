//! Write-once artifact persistence
//!
//! Artifacts in the trail are immutable. Writing the same content twice is accepted so
//! a retried step can re-persist its output; writing different content to a key that
//! already exists is a conflict.

use serde::Serialize;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::traits::ObjectStore;
use super::types::{content_digest, content_type_for_key, ObjectMeta, PutOutcome};

/// Whether a write-once call stored new content or found identical content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOnce {
    Written,
    AlreadyPresent,
}

/// Write `body` under `key` unless identical content is already there
pub async fn write_once(
    store: &dyn ObjectStore,
    key: &str,
    body: Vec<u8>,
) -> StoreResult<(WriteOnce, ObjectMeta)> {
    let digest = content_digest(&body);
    let content_type = content_type_for_key(key);

    match store.put_if_absent(key, body, content_type).await? {
        PutOutcome::Created(meta) => {
            debug!("Wrote artifact {}", key);
            Ok((WriteOnce::Written, meta))
        }
        PutOutcome::Exists(meta) => {
            let existing = store
                .get(key)
                .await?
                .ok_or_else(|| StoreError::backend(format!("artifact {} disappeared", key)))?;
            if content_digest(&existing.body) == digest {
                debug!("Artifact {} already present with identical content", key);
                Ok((WriteOnce::AlreadyPresent, meta))
            } else {
                Err(StoreError::conflict(format!(
                    "artifact {} already exists with different content",
                    key
                )))
            }
        }
    }
}

/// Serialize `value` as pretty JSON and write it once
pub async fn write_json_once<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
) -> StoreResult<(WriteOnce, ObjectMeta)> {
    let body = serde_json::to_vec_pretty(value)?;
    write_once(store, key, body).await
}

/// Overwrite a mutable record such as an execution or pipeline run summary
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
) -> StoreResult<ObjectMeta> {
    let body = serde_json::to_vec_pretty(value)?;
    store.put(key, body, Some("application/json")).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backends::MemoryStore;

    #[tokio::test]
    async fn test_identical_rewrite_is_accepted() {
        let store = MemoryStore::new();
        let (first, _) = write_once(&store, "generated/e/s/stack.ts", b"code".to_vec())
            .await
            .unwrap();
        assert_eq!(first, WriteOnce::Written);

        let (second, _) = write_once(&store, "generated/e/s/stack.ts", b"code".to_vec())
            .await
            .unwrap();
        assert_eq!(second, WriteOnce::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_differing_rewrite_is_conflict() {
        let store = MemoryStore::new();
        write_once(&store, "generated/e/s/stack.ts", b"v1".to_vec())
            .await
            .unwrap();

        let err = write_once(&store, "generated/e/s/stack.ts", b"v2".to_vec())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = store.get("generated/e/s/stack.ts").await.unwrap().unwrap();
        assert_eq!(stored.body, b"v1");
    }

    #[tokio::test]
    async fn test_write_json_once_sets_content_type() {
        let store = MemoryStore::new();
        let (_, meta) = write_json_once(&store, "scenarios/e/s.json", &serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("application/json"));
    }
}
