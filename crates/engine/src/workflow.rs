//! User-facing step machine for a single dubbing job.
//!
//! [`WorkflowController`] owns the polling schedule, the transition
//! dispatcher and the upload tracker. User actions (upload, transcribe,
//! edit, generate voice) are issued through it; status changes observed
//! by polling advance it between [`Step`]s. One reaction is autonomous:
//! observing `voice_generated` issues the merge request without waiting
//! for the user.
//!
//! The controller has a single consumer. Poll outcomes queue on a
//! channel and are applied one at a time by
//! [`process_next`](WorkflowController::process_next). Every accepted
//! action restarts the schedule, and outcomes from a schedule that has
//! been stopped or replaced are dropped unread, so a response fetched
//! before an action can never be mistaken for one fetched after it.

use std::sync::Arc;

use dubflow_client::{ApiError, DubbingApi, ProgressFn, UploadFile};
use dubflow_core::error::CoreError;
use dubflow_core::job::{validate_segments, Job, Segment, Transcript};
use dubflow_core::status::{Action, JobStatus};
use dubflow_core::transcript_edit;
use dubflow_core::types::JobId;
use dubflow_core::upload::validate_upload;
use dubflow_core::voice::VoiceSettings;
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::EngineConfig;
use crate::dispatcher::{Notification, Observation, PollDirective, TransitionDispatcher};
use crate::error::{CurrentError, ErrorKind, WorkflowError};
use crate::events::WorkflowEvent;
use crate::poller::{PollOutcome, PollingController};
use crate::upload::UploadProgressTracker;

/// The step the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Upload,
    SelectLanguage,
    Transcribing,
    EditTranscript,
    /// Choosing a voice, generating it, or merging it into the video.
    Voice,
    Complete,
}

impl Step {
    /// The step a job in `status` belongs on. `None` for `failed`, which
    /// never moves the workflow.
    pub fn for_status(status: JobStatus) -> Option<Step> {
        match status {
            JobStatus::Pending => Some(Step::SelectLanguage),
            JobStatus::Uploading => Some(Step::Upload),
            JobStatus::Transcribing => Some(Step::Transcribing),
            JobStatus::Transcribed => Some(Step::EditTranscript),
            JobStatus::GeneratingVoice | JobStatus::VoiceGenerated | JobStatus::Merging => {
                Some(Step::Voice)
            }
            JobStatus::Completed => Some(Step::Complete),
            JobStatus::Failed => None,
        }
    }
}

pub struct WorkflowController {
    api: Arc<dyn DubbingApi>,
    config: EngineConfig,
    poller: PollingController,
    outcomes: mpsc::UnboundedReceiver<PollOutcome>,
    dispatcher: TransitionDispatcher,
    tracker: Arc<UploadProgressTracker>,
    events: broadcast::Sender<WorkflowEvent>,

    step: Step,
    job_id: Option<JobId>,
    /// Latest accepted snapshot, replaced wholesale on every fetch.
    job: Option<Job>,
    transcript: Option<Transcript>,
    processing: bool,
    last_error: Option<CurrentError>,
}

impl WorkflowController {
    pub fn new(api: Arc<dyn DubbingApi>, config: EngineConfig) -> Self {
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity);
        let poller = PollingController::new(Arc::clone(&api), outcome_tx);
        poller.set_interval(config.poll_interval);

        Self {
            api,
            config,
            poller,
            outcomes,
            dispatcher: TransitionDispatcher::new(),
            tracker: Arc::new(UploadProgressTracker::new()),
            events,
            step: Step::Upload,
            job_id: None,
            job: None,
            transcript: None,
            processing: false,
            last_error: None,
        }
    }

    /// Subscribe to workflow events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Subscribe to upload percentage updates.
    pub fn upload_progress(&self) -> watch::Receiver<u8> {
        self.tracker.subscribe()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    /// Whether remote work started by this workflow is still running.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn last_error(&self) -> Option<&CurrentError> {
        self.last_error.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn tracker(&self) -> &UploadProgressTracker {
        &self.tracker
    }

    // ---- user actions ----

    /// Validate and upload a video, creating a new job.
    ///
    /// On success the workflow observes the new job and moves to
    /// [`Step::SelectLanguage`]. A failed upload must be followed by
    /// [`reset`](Self::reset) before retrying.
    pub async fn upload(&mut self, file: UploadFile) -> Result<JobId, WorkflowError> {
        let result = self.try_upload(file).await;
        self.settle(result)
    }

    async fn try_upload(&mut self, file: UploadFile) -> Result<JobId, WorkflowError> {
        validate_upload(&file.file_name, file.size())?;
        self.tracker.begin()?;

        let on_progress: ProgressFn = {
            let tracker = Arc::clone(&self.tracker);
            let events = self.events.clone();
            Arc::new(move |sent: u64, total: u64| {
                let before = tracker.percent();
                let percent = tracker.record(sent, total);
                if percent != before {
                    let _ = events.send(WorkflowEvent::UploadProgress { percent });
                }
            })
        };

        tracing::info!(file_name = %file.file_name, size_bytes = file.size(), "Upload started");
        self.processing = true;

        let response = match self.api.create_job(file, on_progress).await {
            Ok(response) => response,
            Err(e) => {
                self.processing = false;
                let failure = self.tracker.fail(e.message());
                tracing::warn!(error = %e, "Upload failed");
                return Err(failure.into());
            }
        };

        if self.tracker.percent() < 100 {
            let _ = self.events.send(WorkflowEvent::UploadProgress { percent: 100 });
        }
        self.tracker.finish();
        self.processing = false;

        let job_id = response.job_id;
        tracing::info!(job_id = %job_id, "Upload complete, job created");

        self.observe_job(job_id.clone());
        self.set_step(Step::SelectLanguage);
        self.refresh().await;

        Ok(job_id)
    }

    /// Start transcription, optionally hinting the source language.
    pub async fn start_transcription(&mut self, language: Option<&str>) -> Result<(), WorkflowError> {
        let result = self.try_start_transcription(language).await;
        self.settle(result)
    }

    async fn try_start_transcription(&mut self, language: Option<&str>) -> Result<(), WorkflowError> {
        let job_id = self.require_action(Action::Transcribe)?;
        self.api.start_transcription(&job_id, language).await?;

        tracing::info!(job_id = %job_id, language = ?language, "Transcription started");
        self.clear_error();
        self.dispatcher.expect(JobStatus::Transcribing);
        self.transcript = None;
        self.processing = true;
        self.set_step(Step::Transcribing);
        self.restart_polling(&job_id);
        Ok(())
    }

    /// Replace the transcript's segments.
    ///
    /// Segments must keep unique ids and ordered, positive-length
    /// timings. The full text and SRT rendering are recomputed locally to
    /// match what the service stores.
    pub async fn save_transcript(&mut self, segments: Vec<Segment>) -> Result<(), WorkflowError> {
        let result = self.try_save_transcript(segments).await;
        self.settle(result)
    }

    async fn try_save_transcript(&mut self, segments: Vec<Segment>) -> Result<(), WorkflowError> {
        let job_id = self.job_id.clone().ok_or(WorkflowError::NoJob)?;
        let mut transcript = self.transcript.clone().ok_or(WorkflowError::NoTranscript)?;
        validate_segments(&segments)?;

        self.api.update_transcript(&job_id, &segments).await?;

        transcript.segments = segments;
        transcript.refresh_derived();
        self.store_transcript(&job_id, transcript);
        self.clear_error();
        Ok(())
    }

    /// Save free-form edited text, spreading it across the existing
    /// segments. Timings and ids are kept.
    pub async fn apply_free_text(&mut self, text: &str) -> Result<(), WorkflowError> {
        let result = match self.transcript.as_ref() {
            Some(current) => {
                let mut edited = current.clone();
                let segments = transcript_edit::redistribute(&current.segments, text);
                match edited.apply_edits(&segments) {
                    Ok(()) => Ok(edited.segments),
                    Err(e) => Err(WorkflowError::from(e)),
                }
            }
            None => Err(WorkflowError::NoTranscript),
        };

        match result {
            Ok(segments) => self.save_transcript(segments).await,
            Err(e) => self.settle(Err(e)),
        }
    }

    /// Start voice generation with `settings`.
    pub async fn generate_voice(&mut self, settings: &VoiceSettings) -> Result<(), WorkflowError> {
        let result = self.try_generate_voice(settings).await;
        self.settle(result)
    }

    async fn try_generate_voice(&mut self, settings: &VoiceSettings) -> Result<(), WorkflowError> {
        settings.validate()?;
        let job_id = self.require_action(Action::GenerateVoice)?;
        self.api.generate_voice(&job_id, settings).await?;

        tracing::info!(
            job_id = %job_id,
            language_code = %settings.language_code,
            voice = %settings.voice,
            speed = settings.speed,
            "Voice generation started",
        );
        self.clear_error();
        self.dispatcher.expect(JobStatus::GeneratingVoice);
        self.processing = true;
        self.set_step(Step::Voice);
        self.restart_polling(&job_id);
        Ok(())
    }

    /// Resume observing an existing job.
    ///
    /// Fetches the job once and places the workflow on the step matching
    /// its status, reacting to that status as if it had been polled.
    pub async fn attach(&mut self, job_id: JobId) -> Result<(), WorkflowError> {
        tracing::info!(job_id = %job_id, "Attaching to job");
        self.observe_job(job_id.clone());

        match self.api.get_job(&job_id).await {
            Ok(job) => {
                self.apply_outcome(job_id, Ok(job)).await;
                Ok(())
            }
            Err(e) => {
                let kind = if e.is_decode() {
                    ErrorKind::Decode
                } else {
                    ErrorKind::Fetch
                };
                let err = WorkflowError::Api(e);
                self.surface(CurrentError::new(kind, &err));
                Err(err)
            }
        }
    }

    /// Abandon the current job and return to [`Step::Upload`].
    pub fn reset(&mut self) {
        self.poller.stop();
        self.dispatcher.unbind();
        self.tracker.reset();
        while self.outcomes.try_recv().is_ok() {}

        self.job_id = None;
        self.job = None;
        self.transcript = None;
        self.processing = false;
        self.last_error = None;
        self.set_step(Step::Upload);
        tracing::info!("Workflow reset");
    }

    // ---- observation ----

    /// Fetch the job once, outside the polling schedule.
    pub async fn refresh(&mut self) {
        let Some(job_id) = self.job_id.clone() else {
            return;
        };
        let result = self.api.get_job(&job_id).await;
        self.apply_outcome(job_id, result).await;
    }

    /// Wait for the next poll outcome and apply it.
    ///
    /// Returns `false` without waiting when no schedule is live and no
    /// outcome is queued. An outcome from a retired schedule is consumed
    /// without effect and still counts as processed.
    pub async fn process_next(&mut self) -> bool {
        // A schedule that ends itself queues its last outcome before it
        // reports stopped, so the queue is checked first.
        let outcome = match self.outcomes.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(_) if self.poller.is_running() => self.outcomes.recv().await,
            Err(_) => None,
        };

        let Some(PollOutcome {
            job_id,
            generation,
            result,
        }) = outcome
        else {
            return false;
        };

        if generation != self.poller.generation() {
            tracing::debug!(
                job_id = %job_id,
                generation,
                ok = result.is_ok(),
                "Outcome from retired schedule dropped",
            );
            return true;
        }

        self.apply_outcome(job_id, result).await;
        true
    }

    /// Apply poll outcomes until polling stops.
    pub async fn run_until_idle(&mut self) {
        while self.process_next().await {}
    }

    async fn apply_outcome(&mut self, job_id: JobId, result: Result<Job, ApiError>) {
        let job = match result {
            Ok(job) => job,
            Err(e) => {
                self.apply_fetch_error(&job_id, e);
                return;
            }
        };

        let observation = self.dispatcher.observe(&job);
        let (notifications, directive) = match observation {
            Observation::Accepted {
                notifications,
                directive,
            } => (notifications, directive),
            Observation::Discarded(reason) => {
                tracing::debug!(job_id = %job.job_id, status = %job.status, ?reason, "Snapshot discarded");
                return;
            }
        };

        if self
            .last_error
            .as_ref()
            .is_some_and(|e| e.kind == ErrorKind::Fetch)
        {
            self.last_error = None;
        }
        self.job = Some(job);

        if let Some(directive) = directive {
            self.apply_directive(&job_id, directive);
        }
        for notification in notifications {
            self.apply_notification(notification).await;
        }
    }

    fn apply_fetch_error(&mut self, job_id: &JobId, error: ApiError) {
        if self.dispatcher.job_id() != Some(job_id) {
            tracing::debug!(job_id = %job_id, "Fetch error for retired job ignored");
            return;
        }

        let kind = if error.is_decode() {
            self.poller.stop();
            self.processing = false;
            ErrorKind::Decode
        } else {
            ErrorKind::Fetch
        };
        self.surface(CurrentError::new(kind, &WorkflowError::Api(error)));
    }

    fn apply_directive(&mut self, job_id: &JobId, directive: PollDirective) {
        match directive {
            PollDirective::Start => self.ensure_polling(job_id),
            PollDirective::Stop => self.poller.stop(),
        }
    }

    async fn apply_notification(&mut self, notification: Notification) {
        match notification {
            Notification::StatusChanged {
                job_id, from, to, ..
            } => {
                tracing::info!(job_id = %job_id, from = ?from, to = %to, "Job status changed");
                let _ = self.events.send(WorkflowEvent::StatusChanged {
                    job_id: job_id.clone(),
                    from,
                    to,
                });
                self.apply_status(job_id, to).await;
            }
            Notification::Progress {
                job_id,
                status,
                progress,
                message,
            } => {
                let _ = self.events.send(WorkflowEvent::Progress {
                    job_id,
                    status,
                    progress,
                    message,
                });
            }
            Notification::Completed(job) => {
                tracing::info!(job_id = %job.job_id, "Job completed");
                let _ = self.events.send(WorkflowEvent::Completed { job });
            }
            Notification::Failed { job_id, error } => {
                tracing::warn!(job_id = %job_id, error = %error, "Job failed");
                self.surface(CurrentError::new(
                    ErrorKind::JobFailed,
                    &WorkflowError::JobFailed(error),
                ));
            }
        }
    }

    async fn apply_status(&mut self, job_id: JobId, status: JobStatus) {
        match status {
            JobStatus::Transcribed => {
                self.processing = false;
                self.load_transcript(&job_id).await;
            }
            JobStatus::VoiceGenerated => {
                self.set_step(Step::Voice);
                self.request_merge(&job_id).await;
            }
            JobStatus::Failed => self.processing = false,
            other => {
                self.processing = other.is_active();
                if let Some(step) = Step::for_status(other) {
                    self.set_step(step);
                }
            }
        }
    }

    /// Fetch the transcript and move to the edit step.
    async fn load_transcript(&mut self, job_id: &JobId) {
        match self.api.get_transcript(job_id).await {
            Ok(transcript) => {
                self.store_transcript(job_id, transcript);
                self.set_step(Step::EditTranscript);
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Transcript fetch failed");
                self.surface(CurrentError::new(ErrorKind::Action, &WorkflowError::Api(e)));
            }
        }
    }

    /// Issue the merge request once voice generation has finished.
    ///
    /// Never retried: a failure is surfaced and automatic advancement
    /// stops there.
    async fn request_merge(&mut self, job_id: &JobId) {
        tracing::info!(job_id = %job_id, "Voice generated, requesting merge");

        match self.api.merge(job_id).await {
            Ok(_) => {
                self.dispatcher.expect(JobStatus::Merging);
                self.processing = true;
                let _ = self.events.send(WorkflowEvent::MergeStarted {
                    job_id: job_id.clone(),
                });
                self.restart_polling(job_id);
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Merge request failed");
                self.processing = false;
                self.surface(CurrentError::new(ErrorKind::Action, &WorkflowError::Api(e)));
            }
        }
    }

    // ---- helpers ----

    /// Bind observation to `job_id`, retiring whatever was observed before.
    fn observe_job(&mut self, job_id: JobId) {
        self.poller.stop();
        self.dispatcher.bind(job_id.clone());
        self.job_id = Some(job_id);
        self.job = None;
        self.transcript = None;
        self.processing = false;
        self.last_error = None;
    }

    /// Start polling unless `job_id` is already being polled.
    fn ensure_polling(&self, job_id: &JobId) {
        if self.poller.current_job().as_ref() != Some(job_id) {
            self.restart_polling(job_id);
        }
    }

    /// Replace any running schedule with a fresh one for `job_id`.
    ///
    /// Used after the service accepts an action: everything the old
    /// schedule fetched predates the action.
    fn restart_polling(&self, job_id: &JobId) {
        self.poller.start(Some(job_id), self.config.poll_interval);
    }

    /// The bound job id, if `action` is allowed from the mirrored status.
    ///
    /// Without a snapshot the service is left to enforce its own rules.
    fn require_action(&self, action: Action) -> Result<JobId, WorkflowError> {
        let job_id = self.job_id.clone().ok_or(WorkflowError::NoJob)?;
        if let Some(job) = &self.job {
            if !action.allowed_from(job.status) {
                return Err(CoreError::InvalidState {
                    action: action.name(),
                    status: job.status.as_str(),
                }
                .into());
            }
        }
        Ok(job_id)
    }

    fn store_transcript(&mut self, job_id: &JobId, transcript: Transcript) {
        let _ = self.events.send(WorkflowEvent::TranscriptUpdated {
            job_id: job_id.clone(),
            segments: transcript.segments.len(),
        });
        self.transcript = Some(transcript);
    }

    fn set_step(&mut self, step: Step) {
        if self.step == step {
            return;
        }
        let from = std::mem::replace(&mut self.step, step);
        tracing::debug!(from = ?from, to = ?step, "Workflow step changed");
        let _ = self.events.send(WorkflowEvent::StepChanged { from, to: step });
    }

    /// Put an error in the current-error slot, replacing any prior one.
    fn surface(&mut self, error: CurrentError) {
        let _ = self.events.send(WorkflowEvent::Error(error.clone()));
        self.last_error = Some(error);
    }

    fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Surface an action's error, if any, and pass the result through.
    fn settle<T>(&mut self, result: Result<T, WorkflowError>) -> Result<T, WorkflowError> {
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Workflow action failed");
            self.surface(CurrentError::new(ErrorKind::Action, e));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_follow_status() {
        assert_eq!(Step::for_status(JobStatus::Pending), Some(Step::SelectLanguage));
        assert_eq!(Step::for_status(JobStatus::Transcribed), Some(Step::EditTranscript));
        assert_eq!(Step::for_status(JobStatus::Merging), Some(Step::Voice));
        assert_eq!(Step::for_status(JobStatus::Completed), Some(Step::Complete));
        assert_eq!(Step::for_status(JobStatus::Failed), None);
    }
}
