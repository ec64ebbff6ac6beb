//! Core error types for the ETL wizard

use thiserror::Error;

use crate::state::WizardStatus;

/// Core error type for all operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Non-2xx response that carried a `detail` message
    #[error("{detail}")]
    Backend { status: u16, detail: String },

    /// Network failure or a response that could not be understood
    #[error("{0}")]
    Transport(String),

    #[error("Action '{action}' is not allowed while {status}")]
    InvalidTransition {
        action: &'static str,
        status: WizardStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// True when the failure came from the backend rather than the wire
    pub fn is_backend(&self) -> bool {
        matches!(self, CoreError::Backend { .. })
    }
}

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// The step whose downstream call failed.
///
/// Each kind carries the prefix shown to the operator in front of the
/// backend `detail` (or the transport error text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connect,
    Upload,
    SchemaLookup,
    Preview,
    JobSubmission,
    JobStatus,
    JobExecution,
}

impl FailureKind {
    pub fn prefix(&self, from_backend: bool) -> &'static str {
        match (self, from_backend) {
            (FailureKind::Connect, true) => "Connection error",
            (FailureKind::Connect, false) => "Connection failed",
            (FailureKind::Upload, true) => "File upload error",
            (FailureKind::Upload, false) => "File upload failed",
            (FailureKind::SchemaLookup, true) => "Failed to load columns",
            (FailureKind::SchemaLookup, false) => "Loading columns failed",
            (FailureKind::Preview, _) => "Preview generation failed",
            (FailureKind::JobSubmission, _) => "Ingestion failed to start",
            (FailureKind::JobStatus, _) => "Failed to get job status",
            (FailureKind::JobExecution, _) => "Ingestion error",
        }
    }

    /// Operator-facing message for a failed call
    pub fn message(&self, err: &CoreError) -> String {
        format!("{}: {}", self.prefix(err.is_backend()), err)
    }
}
