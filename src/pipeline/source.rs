//! Source stage: detect and fetch the artifact at the trigger key

use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::error::PipelineError;
use crate::store::{keys, ObjectMeta, ObjectStore};

/// A detected version of the trigger object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRevision {
    pub key: String,
    pub version: String,
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectMeta> for SourceRevision {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            key: meta.key,
            version: meta.version,
            last_modified: meta.last_modified,
        }
    }
}

/// Fetched source, decompressed when the key ends in `.gz`
#[derive(Debug, Clone)]
pub struct SourceArtifact {
    pub revision: SourceRevision,
    pub file_name: String,
    pub body: Vec<u8>,
}

impl SourceArtifact {
    /// Write the artifact into `dir` and return its path
    pub async fn materialize(&self, dir: &Path) -> Result<PathBuf, PipelineError> {
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.body).await?;
        Ok(path)
    }
}

pub async fn detect(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<Option<SourceRevision>, PipelineError> {
    Ok(store.head(key).await?.map(SourceRevision::from))
}

pub async fn fetch(store: &dyn ObjectStore, key: &str) -> Result<SourceArtifact, PipelineError> {
    let object = store
        .get(key)
        .await?
        .ok_or_else(|| PipelineError::SourceMissing(key.to_string()))?;

    let name = keys::file_name(key);
    let (file_name, body) = match name.strip_suffix(".gz") {
        Some(stem) => (stem.to_string(), gunzip(key, &object.body)?),
        None => (name.to_string(), object.body),
    };

    Ok(SourceArtifact {
        revision: object.meta.into(),
        file_name,
        body,
    })
}

fn gunzip(key: &str, data: &[u8]) -> Result<Vec<u8>, PipelineError> {
    use flate2::read::GzDecoder;

    let mut decoder = GzDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| PipelineError::SourceDecode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn test_fetch_plain_artifact() {
        let store = MemoryStore::new();
        store
            .put("codegen-output/stack.ts", b"export {}".to_vec(), None)
            .await
            .unwrap();

        let artifact = fetch(&store, "codegen-output/stack.ts").await.unwrap();
        assert_eq!(artifact.file_name, "stack.ts");
        assert_eq!(artifact.body, b"export {}");

        let detected = detect(&store, "codegen-output/stack.ts")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detected, artifact.revision);
    }

    #[tokio::test]
    async fn test_fetch_gunzips_compressed_artifact() {
        let store = MemoryStore::new();
        store
            .put("codegen-output/stack.ts.gz", gzip(b"export {}"), None)
            .await
            .unwrap();

        let artifact = fetch(&store, "codegen-output/stack.ts.gz").await.unwrap();
        assert_eq!(artifact.file_name, "stack.ts");
        assert_eq!(artifact.body, b"export {}");

        let dir = tempfile::tempdir().unwrap();
        let path = artifact.materialize(dir.path()).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"export {}");
    }

    #[tokio::test]
    async fn test_fetch_rejects_corrupt_gzip_and_missing_source() {
        let store = MemoryStore::new();
        store
            .put("codegen-output/stack.ts.gz", b"not gzip".to_vec(), None)
            .await
            .unwrap();
        assert!(matches!(
            fetch(&store, "codegen-output/stack.ts.gz").await,
            Err(PipelineError::SourceDecode { .. })
        ));
        assert!(matches!(
            fetch(&store, "codegen-output/other.ts").await,
            Err(PipelineError::SourceMissing(_))
        ));
    }
}
