//! Domain model for the dubbing job orchestration engine.
//!
//! - [`status`] — the ordered [`JobStatus`](status::JobStatus) lifecycle
//!   and its active/idle/terminal classification.
//! - [`job`] — the [`Job`](job::Job) snapshot returned by the polled
//!   status endpoint, plus the embedded transcript types.
//! - [`transcript_edit`] — redistribution of free-text edits back onto
//!   timed segments.
//! - [`subtitles`] — SRT rendering of transcript segments.
//! - [`upload`] / [`voice`] — client-side validation of requests before
//!   they reach the processing service.

pub mod error;
pub mod job;
pub mod status;
pub mod subtitles;
pub mod transcript_edit;
pub mod types;
pub mod upload;
pub mod voice;
