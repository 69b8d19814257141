//! Events broadcast by the workflow to presentation layers.
//!
//! Subscribers receive them via
//! [`WorkflowController::subscribe`](crate::workflow::WorkflowController::subscribe).
//! Delivery is best-effort: a subscriber that falls behind the channel
//! capacity sees a `Lagged` error and skips ahead.

use dubflow_core::job::Job;
use dubflow_core::status::JobStatus;
use dubflow_core::types::JobId;

use crate::error::CurrentError;
use crate::workflow::Step;

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StepChanged {
        from: Step,
        to: Step,
    },
    StatusChanged {
        job_id: JobId,
        from: Option<JobStatus>,
        to: JobStatus,
    },
    Progress {
        job_id: JobId,
        status: JobStatus,
        progress: u8,
        message: Option<String>,
    },
    UploadProgress {
        percent: u8,
    },
    /// The transcript was loaded or saved.
    TranscriptUpdated {
        job_id: JobId,
        segments: usize,
    },
    /// An autonomous merge request was accepted.
    MergeStarted {
        job_id: JobId,
    },
    Completed {
        job: Box<Job>,
    },
    Error(CurrentError),
}
