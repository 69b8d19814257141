//! HTTP implementation of [`DubbingApi`] using [`reqwest`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use dubflow_core::job::{Job, Segment, Transcript};
use dubflow_core::types::JobId;
use dubflow_core::voice::VoiceSettings;
use futures::StreamExt;
use reqwest::multipart;

use crate::api::{
    Ack, Download, DownloadKind, DubbingApi, HealthResponse, LanguagesResponse, ProgressFn,
    UploadFile, UploadResponse,
};
use crate::error::{error_message, ApiError};

/// Default timeout for short JSON requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Size of the chunks an upload body is streamed in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// HTTP client for a single dubbing service.
pub struct HttpDubbingApi {
    client: reqwest::Client,
    api_url: String,
    request_timeout: Duration,
}

impl HttpDubbingApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the timeout applied to JSON requests.
    ///
    /// Uploads and downloads are not bounded by it.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`] carrying
    /// the status and the service's error detail on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    ///
    /// The body is read in full before decoding so that a shape mismatch
    /// is reported as [`ApiError::Decode`] rather than a transport error.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DubbingApi for HttpDubbingApi {
    async fn create_job(
        &self,
        file: UploadFile,
        on_progress: ProgressFn,
    ) -> Result<UploadResponse, ApiError> {
        let total = file.size();
        let mime = mime_for(&file.file_name);
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();

        let mut sent = 0u64;
        let body_stream = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            on_progress(sent, total);
            Ok::<_, std::io::Error>(chunk)
        });

        let part = multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(body_stream),
            total,
        )
        .file_name(file.file_name.clone())
        .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        tracing::info!(file_name = %file.file_name, size_bytes = total, "Uploading video");

        let response = self
            .client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn start_transcription(
        &self,
        job_id: &JobId,
        language: Option<&str>,
    ) -> Result<Ack, ApiError> {
        let body = serde_json::json!({ "language": language });

        let response = self
            .client
            .post(self.url(&format!("/api/transcribe/{job_id}")))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn get_transcript(&self, job_id: &JobId) -> Result<Transcript, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/transcript/{job_id}")))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn update_transcript(
        &self,
        job_id: &JobId,
        segments: &[Segment],
    ) -> Result<Ack, ApiError> {
        let body = serde_json::json!({ "segments": segments });

        let response = self
            .client
            .put(self.url(&format!("/api/transcript/{job_id}")))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn generate_voice(
        &self,
        job_id: &JobId,
        settings: &VoiceSettings,
    ) -> Result<Ack, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/api/generate-voice/{job_id}")))
            .timeout(self.request_timeout)
            .json(settings)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn merge(&self, job_id: &JobId) -> Result<Ack, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/api/merge-video/{job_id}")))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Job, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/job/{job_id}")))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn download(&self, job_id: &JobId, kind: DownloadKind) -> Result<Download, ApiError> {
        let path = match kind {
            DownloadKind::Video => format!("/api/download/{job_id}"),
            DownloadKind::Subtitles => format!("/api/download/{job_id}/srt"),
        };

        let response = self.client.get(self.url(&path)).send().await?;
        let response = Self::ensure_success(response).await?;

        let file_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name);
        let content_length = response.content_length();

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ApiError::from))
            .boxed();

        Ok(Download {
            file_name,
            content_length,
            stream,
        })
    }

    async fn list_languages(&self) -> Result<LanguagesResponse, ApiError> {
        let response = self
            .client
            .get(self.url("/api/languages"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        let response = self
            .client
            .get(self.url("/"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

/// MIME type for a video file name, by extension.
fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Extract `filename` from a `Content-Disposition` header value.
fn disposition_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let api = HttpDubbingApi::new("http://localhost:8000/");
        assert_eq!(api.api_url(), "http://localhost:8000");
        assert_eq!(api.url("/api/job/x"), "http://localhost:8000/api/job/x");
    }

    #[test]
    fn mime_types_by_extension() {
        assert_eq!(mime_for("a.MP4"), "video/mp4");
        assert_eq!(mime_for("a.mov"), "video/quicktime");
        assert_eq!(mime_for("a.bin"), "application/octet-stream");
    }

    #[test]
    fn parses_disposition_file_name() {
        assert_eq!(
            disposition_file_name(r#"attachment; filename="clip_dubbed.mp4""#).as_deref(),
            Some("clip_dubbed.mp4")
        );
        assert_eq!(
            disposition_file_name("attachment; filename=clip.srt").as_deref(),
            Some("clip.srt")
        );
        assert_eq!(disposition_file_name("inline"), None);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let api = HttpDubbingApi::new("http://127.0.0.1:9")
            .with_request_timeout(Duration::from_secs(2));
        let err = api.get_job(&JobId::new("missing")).await.unwrap_err();
        assert!(!err.is_decode());
        assert_eq!(err.code(), crate::error::TRANSPORT_ERROR_CODE);
    }
}
