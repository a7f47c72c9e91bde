//! External capabilities driven by the orchestrator
//!
//! Each capability takes a structured request and returns a structured output that
//! is handed verbatim to the next stage. Failures carry a [`FailureClass`] so the
//! orchestrator's retry policy can tell retry-safe errors from permanent ones.

pub mod analyzer;
pub mod classify;
pub mod deployer;
pub mod generator;
pub mod handoff;
pub mod payload;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ChaosError, ErrorCode};
use crate::store::StoreError;

pub use analyzer::{AnalyzerSettings, CodegenAnalyzer};
pub use classify::TransientPattern;
pub use deployer::{CommandDeployer, DeployCommands};
pub use generator::{GeneratorSettings, ModelScenarioGenerator};
pub use handoff::PipelineHandoffDeployer;
pub use payload::{
    AnalyzeOutput, AnalyzeRequest, DeployOperation, DeployOutput, DeployRequest, GenerateOutput,
    GenerateRequest,
};

/// Whether retrying can fix a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Throttling, unavailability, transport failures
    Transient,
    /// Validation failures and malformed input
    Permanent,
}

/// Error returned by a capability invocation
#[derive(Debug, Clone, Error)]
#[error("{category}: {message}")]
pub struct CapabilityError {
    pub class: FailureClass,
    /// Short machine-readable category such as `throttled` or `validation`
    pub category: String,
    pub message: String,
}

impl CapabilityError {
    pub fn transient(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn permanent(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Permanent,
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class == FailureClass::Transient
    }
}

impl From<StoreError> for CapabilityError {
    fn from(err: StoreError) -> Self {
        let category = match &err {
            StoreError::NotFound(_) => "not_found",
            StoreError::Conflict(_) => "artifact_conflict",
            StoreError::PermissionDenied(_) => "access_denied",
            StoreError::Throttled(_) => "throttled",
            StoreError::Timeout(_) => "timeout",
            _ => "store",
        };
        if err.is_retryable() {
            Self::transient(category, err.to_string())
        } else {
            Self::permanent(category, err.to_string())
        }
    }
}

impl From<CapabilityError> for ChaosError {
    fn from(err: CapabilityError) -> Self {
        let code = match err.class {
            FailureClass::Transient => ErrorCode::CAPABILITY_TRANSIENT,
            FailureClass::Permanent => ErrorCode::CAPABILITY_PERMANENT,
        };
        ChaosError::capability_with_code(code, err.message, Some(err.category))
    }
}

/// Produces a scenario from a seed template
#[async_trait]
pub trait ScenarioGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, CapabilityError>;
}

/// Validates a scenario and writes its deployment artifacts
#[async_trait]
pub trait ScenarioAnalyzer: Send + Sync {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeOutput, CapabilityError>;
}

/// Applies a generated deployment artifact
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutput, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_retryability() {
        let err: CapabilityError = StoreError::unavailable("503").into();
        assert!(err.is_transient());

        let err: CapabilityError = StoreError::not_found("templates/x").into();
        assert!(!err.is_transient());
        assert_eq!(err.category, "not_found");

        let err: CapabilityError = StoreError::permission_denied("nope").into();
        assert_eq!(err.class, FailureClass::Permanent);
        assert_eq!(err.category, "access_denied");
    }

    #[test]
    fn test_conversion_to_unified_error() {
        let err: ChaosError = CapabilityError::transient("throttled", "slow down").into();
        assert_eq!(err.code(), ErrorCode::CAPABILITY_TRANSIENT);

        let err: ChaosError = CapabilityError::permanent("validation", "bad").into();
        assert_eq!(err.code(), ErrorCode::CAPABILITY_PERMANENT);
    }
}
