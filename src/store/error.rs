//! Error types for the template store

use crate::error::{ChaosError, ErrorCode};
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record is not valid JSON: {0}")]
    Serialization(String),

    #[error("No object at {0}")]
    NotFound(String),

    /// Write-once key already holds different content
    #[error("Write-once conflict: {0}")]
    Conflict(String),

    /// Key outside the caller's access contract
    #[error("Access denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Backend throttled the request: {0}")]
    Throttled(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Store misconfigured: {0}")]
    Configuration(String),

    #[error("Store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(key: impl Display) -> Self {
        Self::NotFound(key.to_string())
    }

    pub fn conflict(detail: impl Display) -> Self {
        Self::Conflict(detail.to_string())
    }

    pub fn permission_denied(detail: impl Display) -> Self {
        Self::PermissionDenied(detail.to_string())
    }

    pub fn invalid_key(detail: impl Display) -> Self {
        Self::InvalidKey(detail.to_string())
    }

    pub fn unavailable(detail: impl Display) -> Self {
        Self::Unavailable(detail.to_string())
    }

    pub fn configuration(detail: impl Display) -> Self {
        Self::Configuration(detail.to_string())
    }

    pub fn backend(detail: impl Display) -> Self {
        Self::Backend(detail.to_string())
    }

    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Throttled(_) | Self::Unavailable(_) | Self::Timeout(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    fn error_code(&self) -> u16 {
        match self {
            StoreError::Io(_) => ErrorCode::STORE_IO_ERROR,
            StoreError::Serialization(_) => ErrorCode::STORE_SERIALIZATION_ERROR,
            StoreError::NotFound(_) => ErrorCode::STORE_NOT_FOUND,
            StoreError::Conflict(_) => ErrorCode::STORE_CONFLICT,
            StoreError::PermissionDenied(_) => ErrorCode::STORE_PERMISSION_DENIED,
            StoreError::InvalidKey(_) => ErrorCode::STORE_GENERIC,
            StoreError::Throttled(_) | StoreError::Unavailable(_) | StoreError::Timeout(_) => {
                ErrorCode::STORE_UNAVAILABLE
            }
            StoreError::Configuration(_) => ErrorCode::CONFIG_INVALID_VALUE,
            StoreError::Backend(_) => ErrorCode::STORE_BACKEND_ERROR,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StoreError> for ChaosError {
    fn from(err: StoreError) -> Self {
        ChaosError::store_with_code(err.error_code(), err.to_string(), None).with_source(err)
    }
}
