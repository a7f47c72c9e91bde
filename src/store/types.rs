//! Type definitions for the template store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata describing a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Opaque token that changes whenever the object content changes
    pub version: String,
    pub content_type: Option<String>,
}

/// An object body together with its metadata
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: Vec<u8>,
}

impl StoredObject {
    /// Decode the body as UTF-8 text
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.clone())
    }

    /// Deserialize the body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Result of a conditional create
#[derive(Debug, Clone)]
pub enum PutOutcome {
    /// The object did not exist and was written
    Created(ObjectMeta),
    /// An object already existed under the key; nothing was written
    Exists(ObjectMeta),
}

impl PutOutcome {
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            PutOutcome::Created(meta) | PutOutcome::Exists(meta) => meta,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, PutOutcome::Created(_))
    }
}

/// Store health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    pub healthy: bool,
    pub backend_type: String,
    pub latency_ms: u64,
    pub errors: Vec<String>,
}

/// Hex SHA-256 of a body, used as the version token by local backends
pub fn content_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// Guess a content type from the key extension
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext)?;
    match ext {
        "json" => Some("application/json"),
        "jsonl" => Some("application/x-ndjson"),
        "ts" => Some("text/typescript"),
        "gz" => Some("application/gzip"),
        "txt" | "log" => Some("text/plain"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_digest_is_stable() {
        assert_eq!(content_digest(b"abc"), content_digest(b"abc"));
        assert_ne!(content_digest(b"abc"), content_digest(b"abd"));
        assert_eq!(content_digest(b"").len(), 64);
    }

    #[test]
    fn test_content_type_for_key() {
        assert_eq!(
            content_type_for_key("scenarios/e/s.json"),
            Some("application/json")
        );
        assert_eq!(
            content_type_for_key("generated/e/s/stack.ts"),
            Some("text/typescript")
        );
        assert_eq!(content_type_for_key("codegen-output/source"), None);
    }
}
