//! Unattended end-to-end runs of the dubbing workflow.
//!
//! The transcript is accepted as produced; voice settings come from
//! configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use dubflow_client::{DownloadKind, DubbingApi, UploadFile};
use dubflow_core::types::JobId;
use dubflow_engine::{Step, WorkflowController, WorkflowEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::CliConfig;
use crate::download;

/// Files written for a completed job.
#[derive(Debug)]
pub struct Outputs {
    pub video: PathBuf,
    pub subtitles: PathBuf,
}

/// Upload `video`, transcribe it, generate the dubbed voice and download
/// the results.
pub async fn run(api: Arc<dyn DubbingApi>, config: &CliConfig, video: &Path) -> anyhow::Result<Outputs> {
    check_voice(api.as_ref(), config).await;

    let mut workflow = WorkflowController::new(Arc::clone(&api), config.engine());
    let logger = log_events(workflow.subscribe());

    let result = drive(&mut workflow, config, video).await;
    logger.abort();
    let job_id = result?;

    save_outputs(api.as_ref(), &job_id, &config.output_dir).await
}

/// Resume an existing job, wait for it to finish, and download the results.
///
/// A job waiting for user input (a fresh upload or an unreviewed
/// transcript) is advanced with the configured settings.
pub async fn attach(api: Arc<dyn DubbingApi>, config: &CliConfig, job_id: JobId) -> anyhow::Result<Outputs> {
    let mut workflow = WorkflowController::new(Arc::clone(&api), config.engine());
    let logger = log_events(workflow.subscribe());

    let result = resume(&mut workflow, config, job_id).await;
    logger.abort();
    let job_id = result?;

    save_outputs(api.as_ref(), &job_id, &config.output_dir).await
}

async fn drive(workflow: &mut WorkflowController, config: &CliConfig, video: &Path) -> anyhow::Result<JobId> {
    let file = UploadFile::from_path(video)
        .await
        .with_context(|| format!("reading {}", video.display()))?;

    let job_id = workflow.upload(file).await.context("upload failed")?;
    tracing::info!(job_id = %job_id, "Job created");

    advance(workflow, config).await?;
    Ok(job_id)
}

async fn resume(workflow: &mut WorkflowController, config: &CliConfig, job_id: JobId) -> anyhow::Result<JobId> {
    workflow
        .attach(job_id.clone())
        .await
        .with_context(|| format!("fetching job {job_id}"))?;

    advance(workflow, config).await?;
    Ok(job_id)
}

/// Push the workflow forward from whatever step it is on until it
/// completes or stops on an error.
async fn advance(workflow: &mut WorkflowController, config: &CliConfig) -> anyhow::Result<()> {
    loop {
        workflow.run_until_idle().await;
        fail_on_error(workflow)?;

        match workflow.step() {
            Step::SelectLanguage => {
                workflow
                    .start_transcription(config.source_language.as_deref())
                    .await
                    .context("could not start transcription")?;
            }
            Step::EditTranscript => {
                if let Some(transcript) = workflow.transcript() {
                    tracing::info!(
                        language = %transcript.language,
                        segments = transcript.segments.len(),
                        "Transcript ready",
                    );
                }
                workflow
                    .generate_voice(&config.voice)
                    .await
                    .context("could not start voice generation")?;
            }
            Step::Complete => return Ok(()),
            step => {
                if !workflow.is_polling() {
                    bail!("workflow stopped on step {step:?}");
                }
            }
        }
    }
}

fn fail_on_error(workflow: &WorkflowController) -> anyhow::Result<()> {
    match workflow.last_error() {
        Some(error) => bail!("{} (code {})", error.message, error.code),
        None => Ok(()),
    }
}

async fn save_outputs(api: &dyn DubbingApi, job_id: &JobId, dir: &Path) -> anyhow::Result<Outputs> {
    let video = download::save(api, job_id, DownloadKind::Video, dir).await?;
    let subtitles = download::save(api, job_id, DownloadKind::Subtitles, dir).await?;
    Ok(Outputs { video, subtitles })
}

/// Warn when the configured voice is not in the service's catalog.
async fn check_voice(api: &dyn DubbingApi, config: &CliConfig) {
    match api.list_languages().await {
        Ok(catalog) if !catalog.offers(&config.voice.language_code, &config.voice.voice) => {
            tracing::warn!(
                language_code = %config.voice.language_code,
                voice = %config.voice.voice,
                "Voice not offered by the service for this language",
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Could not fetch language catalog"),
    }
}

/// Log workflow events until the channel closes.
fn log_events(mut rx: broadcast::Receiver<WorkflowEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(WorkflowEvent::StepChanged { from, to }) => {
                    tracing::info!(from = ?from, to = ?to, "Step");
                }
                Ok(WorkflowEvent::Progress {
                    status,
                    progress,
                    message,
                    ..
                }) => {
                    tracing::info!(
                        status = %status,
                        progress,
                        message = message.as_deref().unwrap_or(""),
                        "Progress",
                    );
                }
                Ok(WorkflowEvent::UploadProgress { percent }) => {
                    tracing::info!(percent, "Uploading");
                }
                Ok(WorkflowEvent::Error(error)) => {
                    tracing::error!(kind = ?error.kind, code = error.code, "{}", error.message);
                }
                Ok(event) => tracing::debug!(?event, "Workflow event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
