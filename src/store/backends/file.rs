//! File-based store backend
//!
//! Objects live at `<root>/<bucket>/<key>`. Writes go to a staging file first and
//! are moved into place so readers never observe a partially written object.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, info};

use crate::store::{
    config::StoreConfig,
    error::{StoreError, StoreResult},
    keys::validate_key,
    traits::ObjectStore,
    types::{content_digest, content_type_for_key, ObjectMeta, PutOutcome, StoreHealth, StoredObject},
};

const STAGING_DIR: &str = ".staging";

/// File-based store backend
pub struct FileStore {
    bucket_dir: PathBuf,
    staging_dir: PathBuf,
}

impl FileStore {
    /// Create a file store rooted at the configured directory
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        Self::with_root(&config.file.root, &config.bucket).await
    }

    /// Create a file store at an explicit root, mostly for tests
    pub async fn with_root(root: &Path, bucket: &str) -> StoreResult<Self> {
        if bucket.is_empty() || bucket.contains('/') || bucket == STAGING_DIR {
            return Err(StoreError::configuration(format!(
                "invalid bucket name: {:?}",
                bucket
            )));
        }
        let bucket_dir = root.join(bucket);
        let staging_dir = root.join(STAGING_DIR);
        fs::create_dir_all(&bucket_dir).await?;
        fs::create_dir_all(&staging_dir).await?;
        info!("File store initialized at {}", bucket_dir.display());
        Ok(Self {
            bucket_dir,
            staging_dir,
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.bucket_dir.clone(), |path, segment| path.join(segment))
    }

    fn key_for_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.bucket_dir).ok()?;
        let segments: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(segments.join("/"))
    }

    async fn stage(&self, body: &[u8]) -> StoreResult<PathBuf> {
        let staged = self
            .staging_dir
            .join(format!("{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&staged, body).await?;
        Ok(staged)
    }

    async fn ensure_parent(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_meta(&self, key: &str, path: &Path) -> StoreResult<Option<(ObjectMeta, Vec<u8>)>> {
        let body = match fs::read(path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = fs::metadata(path).await?;
        let last_modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let meta = ObjectMeta {
            key: key.to_string(),
            size: body.len() as u64,
            last_modified,
            version: content_digest(&body),
            content_type: content_type_for_key(key).map(str::to_string),
        };
        Ok(Some((meta, body)))
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        validate_key(key)?;
        let path = self.object_path(key);
        if path.is_dir() {
            return Ok(None);
        }
        Ok(self
            .read_meta(key, &path)
            .await?
            .map(|(meta, body)| StoredObject { meta, body }))
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<ObjectMeta> {
        validate_key(key)?;
        debug!("Writing object {}", key);
        let path = self.object_path(key);
        self.ensure_parent(&path).await?;
        let staged = self.stage(&body).await?;
        if let Err(e) = fs::rename(&staged, &path).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e.into());
        }
        Ok(ObjectMeta {
            key: key.to_string(),
            size: body.len() as u64,
            last_modified: Utc::now(),
            version: content_digest(&body),
            content_type: content_type
                .or_else(|| content_type_for_key(key))
                .map(str::to_string),
        })
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome> {
        validate_key(key)?;
        let path = self.object_path(key);
        self.ensure_parent(&path).await?;
        let staged = self.stage(&body).await?;

        // hard_link fails if the destination exists, which makes the create atomic
        let linked = fs::hard_link(&staged, &path).await;
        let _ = fs::remove_file(&staged).await;

        match linked {
            Ok(()) => Ok(PutOutcome::Created(ObjectMeta {
                key: key.to_string(),
                size: body.len() as u64,
                last_modified: Utc::now(),
                version: content_digest(&body),
                content_type: content_type
                    .or_else(|| content_type_for_key(key))
                    .map(str::to_string),
            })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Object {} already exists", key);
                match self.read_meta(key, &path).await? {
                    Some((meta, _)) => Ok(PutOutcome::Exists(meta)),
                    None => Err(StoreError::backend(format!(
                        "object {} vanished during conditional write",
                        key
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &str) -> StoreResult<Option<ObjectMeta>> {
        Ok(self.get(key).await?.map(|object| object.meta))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let mut results = Vec::new();
        let mut pending = vec![self.bucket_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let Some(key) = self.key_for_path(&path) else {
                    continue;
                };
                if entry.file_type().await?.is_dir() {
                    // Only descend into directories that can still contain matches
                    let dir_prefix = format!("{}/", key);
                    if dir_prefix.starts_with(prefix) || prefix.starts_with(&dir_prefix) {
                        pending.push(path);
                    }
                } else if key.starts_with(prefix) {
                    if let Some((meta, _)) = self.read_meta(&key, &path).await? {
                        results.push(meta);
                    }
                }
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        let start = Instant::now();
        let mut errors = Vec::new();

        let probe = self.staging_dir.join(".health");
        if let Err(e) = fs::write(&probe, b"ok").await {
            errors.push(format!("write failed: {}", e));
        } else {
            let _ = fs::remove_file(&probe).await;
        }

        Ok(StoreHealth {
            healthy: errors.is_empty(),
            backend_type: "file".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
            errors,
        })
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
