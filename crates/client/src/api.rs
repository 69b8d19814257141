//! The remote operations the orchestration engine consumes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dubflow_core::job::{Job, Segment, Transcript};
use dubflow_core::types::JobId;
use dubflow_core::voice::VoiceSettings;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Byte-progress callback invoked by the transport as an upload proceeds.
///
/// Arguments are `(bytes_sent, total_bytes)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A video file read into memory, ready to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a file from disk, naming the upload after its final path
    /// component.
    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Response to a successful upload; the job now exists server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    pub filename: String,
    pub size_bytes: u64,
    pub message: String,
}

/// Acknowledgement of an accepted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
    #[serde(default)]
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceOption {
    pub id: String,
    pub name: String,
    pub gender: String,
    #[serde(default)]
    pub sample_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageOption {
    pub code: String,
    pub name: String,
    pub voices: Vec<VoiceOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageOption>,
}

impl LanguagesResponse {
    /// Whether `voice` is offered for the language `code`.
    pub fn offers(&self, code: &str, voice: &str) -> bool {
        self.languages
            .iter()
            .any(|l| l.code == code && l.voices.iter().any(|v| v.id == voice))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Which artifact of a completed job to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// The dubbed video.
    Video,
    /// The transcript as an SRT file.
    Subtitles,
}

/// A streamed binary artifact.
pub struct Download {
    /// File name suggested by the service, if any.
    pub file_name: Option<String>,
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, Result<Vec<u8>, ApiError>>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Request/response operations exposed by the dubbing service.
///
/// Only [`get_job`](Self::get_job) is safe to call repeatedly; the
/// action methods start remote work and must not be blindly retried.
#[async_trait]
pub trait DubbingApi: Send + Sync {
    /// Upload a video, creating a new job.
    async fn create_job(
        &self,
        file: UploadFile,
        on_progress: ProgressFn,
    ) -> Result<UploadResponse, ApiError>;

    /// Start transcription, optionally hinting the source language.
    async fn start_transcription(
        &self,
        job_id: &JobId,
        language: Option<&str>,
    ) -> Result<Ack, ApiError>;

    async fn get_transcript(&self, job_id: &JobId) -> Result<Transcript, ApiError>;

    /// Replace all transcript segments.
    async fn update_transcript(
        &self,
        job_id: &JobId,
        segments: &[Segment],
    ) -> Result<Ack, ApiError>;

    async fn generate_voice(
        &self,
        job_id: &JobId,
        settings: &VoiceSettings,
    ) -> Result<Ack, ApiError>;

    /// Merge the generated voice track into the video.
    async fn merge(&self, job_id: &JobId) -> Result<Ack, ApiError>;

    /// Fetch the current job snapshot.
    async fn get_job(&self, job_id: &JobId) -> Result<Job, ApiError>;

    async fn download(&self, job_id: &JobId, kind: DownloadKind) -> Result<Download, ApiError>;

    async fn list_languages(&self) -> Result<LanguagesResponse, ApiError>;

    async fn health(&self) -> Result<HealthResponse, ApiError>;
}
