#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dubflow_client::{
    Ack, ApiError, Download, DownloadKind, DubbingApi, HealthResponse, LanguagesResponse,
    ProgressFn, UploadFile, UploadResponse,
};
use dubflow_core::job::{Job, Segment, Transcript};
use dubflow_core::status::JobStatus;
use dubflow_core::types::JobId;
use dubflow_core::voice::VoiceSettings;
use dubflow_engine::{EngineConfig, WorkflowController};

/// One scripted reply to `get_job`.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(JobStatus),
    Progress(JobStatus, u8),
    Failed(&'static str),
    /// The request never reached the service.
    Transport,
    /// A 2xx response with an unrecognized status.
    Malformed,
    /// The inner reply, answered only after a delay.
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn delayed(delay: Duration, reply: Reply) -> Self {
        Reply::Delayed(delay, Box::new(reply))
    }
}

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub create_job: AtomicUsize,
    pub start_transcription: AtomicUsize,
    pub get_transcript: AtomicUsize,
    pub update_transcript: AtomicUsize,
    pub generate_voice: AtomicUsize,
    pub merge: AtomicUsize,
    pub get_job: AtomicUsize,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory [`DubbingApi`] with a scripted `get_job` sequence.
///
/// Replies are consumed in order; once the script runs out the last reply
/// repeats forever.
pub struct FakeApi {
    pub job_id: JobId,
    pub calls: Calls,
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    pub fail_upload: AtomicBool,
    pub fail_merge: AtomicBool,
    saved_segments: Mutex<Option<Vec<Segment>>>,
}

impl FakeApi {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            job_id: JobId::new(uuid::Uuid::new_v4().to_string()),
            calls: Calls::default(),
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            fail_upload: AtomicBool::new(false),
            fail_merge: AtomicBool::new(false),
            saved_segments: Mutex::new(None),
        })
    }

    /// Append replies to the script.
    pub fn push(&self, replies: impl IntoIterator<Item = Reply>) {
        self.script.lock().unwrap().extend(replies);
    }

    pub fn get_job_calls(&self) -> usize {
        Calls::count(&self.calls.get_job)
    }

    pub fn merge_calls(&self) -> usize {
        Calls::count(&self.calls.merge)
    }

    pub fn saved_segments(&self) -> Option<Vec<Segment>> {
        self.saved_segments.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = script.pop_front() {
            *last = Some(reply);
        }
        last.clone().unwrap_or(Reply::Status(JobStatus::Pending))
    }

    fn ack(&self) -> Ack {
        Ack {
            message: "ok".into(),
            job_id: Some(self.job_id.clone()),
        }
    }
}

pub fn job(job_id: &JobId, status: JobStatus, progress: u8) -> Job {
    Job {
        job_id: job_id.clone(),
        status,
        progress,
        message: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        video_filename: Some("clip.mp4".into()),
        transcript: None,
        output_url: None,
        error: None,
    }
}

pub fn sample_transcript() -> Transcript {
    let mut transcript = Transcript {
        language: "en".into(),
        full_text: String::new(),
        segments: vec![
            Segment {
                id: 0,
                start: 0.0,
                end: 2.5,
                text: "Hello there.".into(),
            },
            Segment {
                id: 1,
                start: 2.5,
                end: 5.0,
                text: "Welcome to the show.".into(),
            },
        ],
        srt: None,
    };
    transcript.refresh_derived();
    transcript
}

#[async_trait]
impl DubbingApi for FakeApi {
    async fn create_job(
        &self,
        file: UploadFile,
        on_progress: ProgressFn,
    ) -> Result<UploadResponse, ApiError> {
        self.calls.create_job.fetch_add(1, Ordering::SeqCst);
        let total = file.size();
        on_progress(total / 4, total);
        on_progress(total / 2, total);

        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ApiError::Api {
                status: 502,
                message: "Bad Gateway".into(),
            });
        }

        on_progress(total, total);
        Ok(UploadResponse {
            job_id: self.job_id.clone(),
            filename: file.file_name,
            size_bytes: total,
            message: "Video uploaded successfully".into(),
        })
    }

    async fn start_transcription(
        &self,
        _job_id: &JobId,
        _language: Option<&str>,
    ) -> Result<Ack, ApiError> {
        self.calls.start_transcription.fetch_add(1, Ordering::SeqCst);
        Ok(self.ack())
    }

    async fn get_transcript(&self, _job_id: &JobId) -> Result<Transcript, ApiError> {
        self.calls.get_transcript.fetch_add(1, Ordering::SeqCst);
        Ok(sample_transcript())
    }

    async fn update_transcript(
        &self,
        _job_id: &JobId,
        segments: &[Segment],
    ) -> Result<Ack, ApiError> {
        self.calls.update_transcript.fetch_add(1, Ordering::SeqCst);
        *self.saved_segments.lock().unwrap() = Some(segments.to_vec());
        Ok(self.ack())
    }

    async fn generate_voice(
        &self,
        _job_id: &JobId,
        _settings: &VoiceSettings,
    ) -> Result<Ack, ApiError> {
        self.calls.generate_voice.fetch_add(1, Ordering::SeqCst);
        Ok(self.ack())
    }

    async fn merge(&self, _job_id: &JobId) -> Result<Ack, ApiError> {
        self.calls.merge.fetch_add(1, Ordering::SeqCst);
        if self.fail_merge.load(Ordering::SeqCst) {
            return Err(ApiError::Api {
                status: 400,
                message: "No voiceover available".into(),
            });
        }
        Ok(self.ack())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Job, ApiError> {
        self.calls.get_job.fetch_add(1, Ordering::SeqCst);
        let mut reply = self.next_reply();
        let reply = loop {
            match reply {
                Reply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                other => break other,
            }
        };
        match reply {
            Reply::Status(status) => Ok(job(job_id, status, 0)),
            Reply::Progress(status, progress) => Ok(job(job_id, status, progress)),
            Reply::Failed(error) => {
                let mut failed = job(job_id, JobStatus::Failed, 0);
                failed.error = Some(error.to_string());
                Ok(failed)
            }
            Reply::Transport => Err(ApiError::Api {
                status: 503,
                message: "Service Unavailable".into(),
            }),
            Reply::Malformed => Err(ApiError::Decode(
                "unknown variant `archived`".into(),
            )),
            Reply::Delayed(..) => unreachable!("delays are unwrapped above"),
        }
    }

    async fn download(&self, _job_id: &JobId, _kind: DownloadKind) -> Result<Download, ApiError> {
        Err(ApiError::Api {
            status: 400,
            message: "Video not ready for download".into(),
        })
    }

    async fn list_languages(&self) -> Result<LanguagesResponse, ApiError> {
        Ok(LanguagesResponse {
            languages: Vec::new(),
        })
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        Ok(HealthResponse {
            status: "ok".into(),
            service: "dubbing".into(),
            version: "1.0.0".into(),
        })
    }
}

/// Engine config with the default one-second poll interval.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_secs(1),
        event_capacity: 64,
    }
}

/// A workflow controller backed by `api`.
pub fn workflow(api: &Arc<FakeApi>) -> WorkflowController {
    WorkflowController::new(api.clone(), test_config())
}

/// A small valid upload.
pub fn video() -> UploadFile {
    UploadFile::new("clip.mp4", vec![0u8; 4096])
}
