//! Status transition detection over a stream of job snapshots.
//!
//! [`TransitionDispatcher`] is bound to one job at a time. Every snapshot
//! fetched for that job is passed to [`observe`](TransitionDispatcher::observe),
//! which decides whether the snapshot represents a new status, a progress
//! update within the current status, or nothing worth reporting.
//!
//! Snapshots may arrive out of order because fetches overlap. Status only
//! moves forward along the progression (or into `failed`), so a snapshot
//! that reports an earlier status than the one already notified is stale
//! and is discarded.

use dubflow_core::job::Job;
use dubflow_core::status::{JobStatus, StatusClass};
use dubflow_core::types::JobId;

/// A change worth telling the workflow about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The job reached a status not notified before.
    StatusChanged {
        job_id: JobId,
        from: Option<JobStatus>,
        to: JobStatus,
        progress: u8,
    },
    /// Progress moved within an unchanged status.
    Progress {
        job_id: JobId,
        status: JobStatus,
        progress: u8,
        message: Option<String>,
    },
    /// First observation of `completed`, carrying the full snapshot.
    Completed(Box<Job>),
    /// First observation of `failed`, carrying the job's error text.
    Failed { job_id: JobId, error: String },
}

/// What the consumer must do with the polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDirective {
    /// Remote work is in flight; make sure the job is being polled.
    Start,
    /// Nothing is in flight; stop polling.
    Stop,
}

impl PollDirective {
    pub fn for_status(status: JobStatus) -> Self {
        match status.class() {
            StatusClass::Active => PollDirective::Start,
            StatusClass::Idle | StatusClass::Terminal => PollDirective::Stop,
        }
    }
}

/// Why a snapshot was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// No job is bound.
    Unbound,
    /// The snapshot belongs to a job that is no longer observed.
    ForeignJob,
    /// A terminal status was already notified.
    AfterTerminal,
    /// The status is earlier in the progression than one already seen.
    Stale,
    /// Same status, lower progress than already seen.
    ProgressRegression,
}

/// Result of observing one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The snapshot is current. `notifications` may be empty when it only
    /// repeats what was already reported. `directive` is set only when
    /// the status changed.
    Accepted {
        notifications: Vec<Notification>,
        directive: Option<PollDirective>,
    },
    Discarded(Discard),
}

impl Observation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Observation::Accepted { .. })
    }

    fn quiet() -> Self {
        Observation::Accepted {
            notifications: Vec::new(),
            directive: None,
        }
    }
}

/// Detects status transitions for the single job currently bound.
#[derive(Debug, Default)]
pub struct TransitionDispatcher {
    job_id: Option<JobId>,
    /// Last status a notification was emitted for.
    last_status: Option<JobStatus>,
    /// Highest progress seen for `last_status`.
    last_progress: u8,
    /// Statuses before this one are stale even if nothing was notified
    /// since the last [`expect`](Self::expect).
    floor: Option<JobStatus>,
}

impl TransitionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `job_id`, clearing all state from any previous job.
    pub fn bind(&mut self, job_id: JobId) {
        tracing::debug!(job_id = %job_id, "Dispatcher bound");
        *self = Self {
            job_id: Some(job_id),
            ..Self::default()
        };
    }

    /// Stop observing; every later snapshot is discarded.
    pub fn unbind(&mut self) {
        *self = Self::default();
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        self.last_status
    }

    /// Record that an accepted request moved the job to `status`.
    ///
    /// Re-running a stage (transcribing again from `transcribed`, or
    /// regenerating voice from `voice_generated`) legitimately moves the
    /// job backwards. This resets the last-notified status so the stage
    /// is reported again, and treats anything earlier than `status` as
    /// stale from now on.
    pub fn expect(&mut self, status: JobStatus) {
        self.last_status = None;
        self.last_progress = 0;
        self.floor = Some(status);
    }

    /// Observe one snapshot.
    pub fn observe(&mut self, job: &Job) -> Observation {
        let Some(bound) = &self.job_id else {
            return Observation::Discarded(Discard::Unbound);
        };
        if job.job_id != *bound {
            return Observation::Discarded(Discard::ForeignJob);
        }

        let status = job.status;

        if let Some(last) = self.last_status {
            if last.is_terminal() {
                return Observation::Discarded(Discard::AfterTerminal);
            }
            if status == last {
                return self.observe_progress(job);
            }
            if status != JobStatus::Failed && status < last {
                return Observation::Discarded(Discard::Stale);
            }
        }
        if let Some(floor) = self.floor {
            if status != JobStatus::Failed && status < floor {
                return Observation::Discarded(Discard::Stale);
            }
        }

        let from = self.last_status.replace(status);
        self.last_progress = job.progress;

        let mut notifications = vec![Notification::StatusChanged {
            job_id: job.job_id.clone(),
            from,
            to: status,
            progress: job.progress,
        }];
        match status {
            JobStatus::Completed => {
                notifications.push(Notification::Completed(Box::new(job.clone())));
            }
            JobStatus::Failed => {
                notifications.push(Notification::Failed {
                    job_id: job.job_id.clone(),
                    error: job.error_text().to_string(),
                });
            }
            _ => {}
        }

        Observation::Accepted {
            notifications,
            directive: Some(PollDirective::for_status(status)),
        }
    }

    fn observe_progress(&mut self, job: &Job) -> Observation {
        if job.progress < self.last_progress {
            return Observation::Discarded(Discard::ProgressRegression);
        }
        if job.progress == self.last_progress {
            return Observation::quiet();
        }

        self.last_progress = job.progress;
        Observation::Accepted {
            notifications: vec![Notification::Progress {
                job_id: job.job_id.clone(),
                status: job.status,
                progress: job.progress,
                message: job.message.clone(),
            }],
            directive: None,
        }
    }
}
