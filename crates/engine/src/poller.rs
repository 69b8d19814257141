//! Periodic job status fetching.
//!
//! [`PollingController`] owns at most one schedule at a time. A schedule
//! is a Tokio task that fires a fetch immediately and then once per
//! interval until its [`CancellationToken`] is cancelled. Ticks are
//! wall-clock scheduled: each fetch runs as its own task, so a slow
//! response never delays the next tick and fetches may overlap. Results
//! are delivered as [`PollOutcome`]s to the current outcome sink.
//!
//! A schedule ends when:
//! - [`stop`](PollingController::stop) or a new
//!   [`start`](PollingController::start) cancels it,
//! - a fetch succeeds with a terminal status, or
//! - a fetch returns a response that cannot be decoded.
//!
//! Transport failures never end a schedule; the next tick retries.
//!
//! Every [`start`](PollingController::start) and
//! [`stop`](PollingController::stop) advances the controller's
//! generation. Outcomes carry the generation of the schedule that issued
//! them, so a consumer can drop responses that land after their schedule
//! was retired.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use dubflow_client::{ApiError, DubbingApi};
use dubflow_core::job::Job;
use dubflow_core::types::JobId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_POLL_INTERVAL;

/// Result of one fetch, tagged with the job and schedule it was issued for.
#[derive(Debug)]
pub struct PollOutcome {
    pub job_id: JobId,
    pub generation: u64,
    pub result: Result<Job, ApiError>,
}

/// Slot holding the current outcome consumer.
///
/// Ticks read it at delivery time, so replacing the consumer never
/// requires rebuilding the schedule.
type SinkSlot = Arc<RwLock<mpsc::UnboundedSender<PollOutcome>>>;

/// Bookkeeping for the running schedule.
struct ActiveSchedule {
    job_id: JobId,
    cancel: CancellationToken,
    task_handle: tokio::task::JoinHandle<()>,
}

impl ActiveSchedule {
    /// End the tick loop. Fetches already spawned still deliver.
    fn retire(self) -> JobId {
        self.cancel.cancel();
        self.task_handle.abort();
        self.job_id
    }
}

/// Drives one periodic fetch schedule for the observed job.
pub struct PollingController {
    api: Arc<dyn DubbingApi>,
    interval_ms: Arc<AtomicU64>,
    sink: SinkSlot,
    generation: AtomicU64,
    active: Mutex<Option<ActiveSchedule>>,
}

impl PollingController {
    /// Create a controller delivering outcomes to `sink`.
    pub fn new(api: Arc<dyn DubbingApi>, sink: mpsc::UnboundedSender<PollOutcome>) -> Self {
        Self {
            api,
            interval_ms: Arc::new(AtomicU64::new(DEFAULT_POLL_INTERVAL.as_millis() as u64)),
            sink: Arc::new(RwLock::new(sink)),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Start polling `job_id` every `interval`.
    ///
    /// Any existing schedule is cancelled first, so at most one is ever
    /// active. The first fetch fires immediately. `None` is a no-op.
    pub fn start(&self, job_id: Option<&JobId>, interval: Duration) {
        let Some(job_id) = job_id else {
            tracing::debug!("Polling start ignored, no job id");
            return;
        };

        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.take() {
            previous.retire();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);

        let cancel = CancellationToken::new();
        let task_handle = tokio::spawn(run_schedule(
            Arc::clone(&self.api),
            job_id.clone(),
            generation,
            Arc::clone(&self.interval_ms),
            Arc::clone(&self.sink),
            cancel.clone(),
        ));

        tracing::info!(
            job_id = %job_id,
            generation,
            interval_ms = interval.as_millis() as u64,
            "Polling started",
        );

        *active = Some(ActiveSchedule {
            job_id: job_id.clone(),
            cancel,
            task_handle,
        });
    }

    /// Cancel the current schedule. Safe when nothing is running.
    ///
    /// No fetch fires after this returns, including one whose tick was
    /// already due. A request already on the wire is not aborted; its
    /// outcome is still delivered, tagged with the retired generation.
    pub fn stop(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(schedule) = active.take() {
            let job_id = schedule.retire();
            tracing::info!(job_id = %job_id, "Polling stopped");
        }
    }

    /// Generation of the live schedule. Outcomes tagged with any other
    /// value came from a schedule that has since been stopped or replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Change the interval. The tick already waiting is unaffected; the
    /// new interval applies from the next one.
    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    /// Replace the outcome consumer in place.
    pub fn set_sink(&self, sink: mpsc::UnboundedSender<PollOutcome>) {
        *self.sink.write().unwrap_or_else(|e| e.into_inner()) = sink;
    }

    /// Whether a schedule is live. A schedule that ended on its own
    /// (terminal status or decode failure) is not.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|s| !s.cancel.is_cancelled())
    }

    /// The job being polled, if a schedule is live.
    pub fn current_job(&self) -> Option<JobId> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .filter(|s| !s.cancel.is_cancelled())
            .map(|s| s.job_id.clone())
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Schedule loop: one fetch now, then one per interval until cancelled.
async fn run_schedule(
    api: Arc<dyn DubbingApi>,
    job_id: JobId,
    generation: u64,
    interval_ms: Arc<AtomicU64>,
    sink: SinkSlot,
    cancel: CancellationToken,
) {
    let mut tick = 0u64;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        tick += 1;
        tokio::spawn(fetch_once(
            Arc::clone(&api),
            job_id.clone(),
            generation,
            Arc::clone(&sink),
            cancel.clone(),
            tick,
        ));

        let delay = Duration::from_millis(interval_ms.load(Ordering::Relaxed));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!(job_id = %job_id, ticks = tick, "Polling schedule ended");
}

/// One tick: fetch the job and deliver the outcome.
///
/// The outcome is queued before a terminal or undecodable response ends
/// the schedule, so a consumer that sees the schedule stopped always
/// finds the final outcome waiting.
async fn fetch_once(
    api: Arc<dyn DubbingApi>,
    job_id: JobId,
    generation: u64,
    sink: SinkSlot,
    cancel: CancellationToken,
    tick: u64,
) {
    // The schedule may have been cancelled between spawn and first poll.
    if cancel.is_cancelled() {
        return;
    }

    tracing::debug!(job_id = %job_id, tick, "Fetching job status");
    let result = api.get_job(&job_id).await;

    let ends_schedule = match &result {
        Ok(job) if job.status.is_terminal() => {
            tracing::info!(job_id = %job_id, status = %job.status, "Terminal status, polling ends");
            true
        }
        Ok(_) => false,
        Err(e) if e.is_decode() => {
            tracing::error!(job_id = %job_id, error = %e, "Undecodable job status, polling ends");
            true
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, tick, error = %e, "Job status fetch failed");
            false
        }
    };

    let sender = sink.read().unwrap_or_else(|e| e.into_inner()).clone();
    let outcome = PollOutcome {
        job_id,
        generation,
        result,
    };
    if sender.send(outcome).is_err() {
        tracing::debug!("Poll outcome dropped, no consumer");
    }

    if ends_schedule {
        cancel.cancel();
    }
}
