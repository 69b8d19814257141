//! Job orchestration for dubbing jobs.
//!
//! - [`poller`] drives one periodic fetch schedule per observed job.
//! - [`dispatcher`] turns the stream of snapshots into status
//!   notifications, coalescing repeats and discarding stale reports.
//! - [`upload`] tracks byte progress of a video upload.
//! - [`workflow`] ties them together into the user-facing step machine.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod poller;
pub mod upload;
pub mod workflow;

pub use config::EngineConfig;
pub use dispatcher::{Discard, Notification, Observation, PollDirective, TransitionDispatcher};
pub use error::{CurrentError, ErrorKind, WorkflowError};
pub use events::WorkflowEvent;
pub use poller::{PollOutcome, PollingController};
pub use upload::{UploadError, UploadProgressTracker, UploadState};
pub use workflow::{Step, WorkflowController};
