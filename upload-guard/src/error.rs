//! Error types for upload-guard

use std::time::Duration;
use thiserror::Error;

/// Malformed or unusable trigger input. Fatal to the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Missing or mistyped field in the notification or workflow input
    #[error("Invalid event format: {0}")]
    InvalidInput(String),

    /// Empty key or a directory placeholder such as `folder/`
    #[error("Invalid S3 object key: '{0}'")]
    InvalidKey(String),
}

/// Missing or unusable startup configuration. Fatal at process start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        name: &'static str,
        reason: String,
    },
}

/// Failure of a single call to an external service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} failed: {message}")]
    Call {
        operation: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn call(operation: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Call { operation, message: message.into() }
    }
}

/// The workflow engine refused or failed to start an execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to start workflow execution '{execution_name}': {source}")]
pub struct DispatchFailure {
    pub execution_name: String,
    #[source]
    pub source: ServiceError,
}

/// Errors that surface as a failed invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchFailure),
}
