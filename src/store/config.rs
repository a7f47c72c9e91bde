//! Store configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Filesystem storage (default)
    #[default]
    File,
    /// Memory storage (for testing)
    Memory,
    /// S3-compatible object storage
    S3,
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            "s3" => Ok(Self::S3),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Main store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: BackendType,

    /// Logical bucket name handed to capabilities in their payloads
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Filesystem backend settings
    #[serde(default)]
    pub file: FileConfig,

    /// S3 backend settings
    #[serde(default)]
    pub s3: S3Config,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            bucket: default_bucket(),
            file: FileConfig::default(),
            s3: S3Config::default(),
        }
    }
}

/// Filesystem store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Root directory; objects live under `<root>/<bucket>/<key>`
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// S3 store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    /// Custom endpoint, e.g. for a local S3-compatible server
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Key prefix prepended to every object key
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_bucket() -> String {
    "chaos-templates".to_string()
}

fn default_root() -> PathBuf {
    directories::ProjectDirs::from("dev", "chaosforge", "chaosforge")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".chaosforge/store"))
}
