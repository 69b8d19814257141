use dubflow_client::error::{ApiError, TRANSPORT_ERROR_CODE};
use dubflow_core::error::CoreError;

use crate::upload::UploadError;

/// Errors returned by [`WorkflowController`](crate::workflow::WorkflowController)
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The processing service reported the job as failed.
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("No job is attached")]
    NoJob,

    #[error("No transcript is loaded")]
    NoTranscript,
}

impl WorkflowError {
    /// Numeric classification; the service's status code for remote
    /// rejections, zero for everything detected locally.
    pub fn code(&self) -> u16 {
        match self {
            WorkflowError::Api(e) => e.code(),
            _ => TRANSPORT_ERROR_CODE,
        }
    }

    /// Human-readable message suitable for display.
    pub fn message(&self) -> String {
        match self {
            WorkflowError::Api(e) => e.message(),
            WorkflowError::JobFailed(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Where the error in the current-error slot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A status fetch failed in transit. Polling continues.
    Fetch,
    /// A status fetch returned something unrecognizable. Polling stopped.
    Decode,
    /// The job itself reached `failed`.
    JobFailed,
    /// A user-initiated or autonomous request was rejected.
    Action,
}

/// The error currently shown to the user.
///
/// The workflow holds at most one; the latest replaces the prior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: u16,
}

impl CurrentError {
    pub fn new(kind: ErrorKind, error: &WorkflowError) -> Self {
        Self {
            kind,
            message: error.message(),
            code: error.code(),
        }
    }
}
