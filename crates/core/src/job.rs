//! Job snapshot and transcript types as reported by the processing service.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::JobStatus;
use crate::subtitles;
use crate::types::{JobId, Timestamp};

/// Error text shown when a job fails without reporting a reason.
pub const GENERIC_FAILURE_MESSAGE: &str = "Processing failed";

/// One fetched representation of a job's state.
///
/// The client never patches a snapshot; every successful poll replaces
/// the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Completion of the current stage (0-100).
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub video_filename: Option<String>,
    #[serde(default)]
    pub transcript: Option<Transcript>,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    /// Error text for a failed job, falling back to a generic message.
    pub fn error_text(&self) -> &str {
        self.error
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(GENERIC_FAILURE_MESSAGE)
    }
}

/// A timed span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Stable across edits.
    pub id: i64,
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
    pub text: String,
}

/// Transcript of a job's source audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Detected or requested language code.
    pub language: String,
    pub full_text: String,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub srt: Option<String>,
}

impl Transcript {
    /// Check the segment invariants: unique ids, `start < end`, and
    /// non-decreasing start offsets.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_segments(&self.segments)
    }

    /// Replace the segment texts with `edited`, keeping ids and timings.
    ///
    /// `edited` must describe exactly the same ids with the same timings
    /// as the current segments; only `text` may differ. The full text and
    /// SRT rendering are recomputed from the new segments.
    pub fn apply_edits(&mut self, edited: &[Segment]) -> Result<(), CoreError> {
        if edited.len() != self.segments.len() {
            return Err(CoreError::Validation(format!(
                "Expected {} segments, got {}",
                self.segments.len(),
                edited.len()
            )));
        }

        for (current, next) in self.segments.iter().zip(edited) {
            if current.id != next.id || current.start != next.start || current.end != next.end {
                return Err(CoreError::Validation(format!(
                    "Segment {} may only change its text",
                    current.id
                )));
            }
        }

        for (current, next) in self.segments.iter_mut().zip(edited) {
            current.text = next.text.clone();
        }
        self.refresh_derived();
        Ok(())
    }

    /// Recompute `full_text` and `srt` from the segments.
    pub fn refresh_derived(&mut self) {
        self.full_text = join_text(&self.segments);
        self.srt = Some(subtitles::segments_to_srt(&self.segments));
    }
}

/// Join segment texts with single spaces.
pub fn join_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Check segment ordering, timing, and id uniqueness.
pub fn validate_segments(segments: &[Segment]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(segments.len());
    let mut previous_start = f64::NEG_INFINITY;

    for segment in segments {
        if !seen.insert(segment.id) {
            return Err(CoreError::Validation(format!(
                "Duplicate segment id {}",
                segment.id
            )));
        }
        if !(segment.start < segment.end) {
            return Err(CoreError::Validation(format!(
                "Segment {} must start before it ends ({} >= {})",
                segment.id, segment.start, segment.end
            )));
        }
        if segment.start < previous_start {
            return Err(CoreError::Validation(format!(
                "Segment {} starts before the segment preceding it",
                segment.id
            )));
        }
        previous_start = segment.start;
    }

    Ok(())
}
