use std::time::Duration;

/// Default interval between job status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Broadcast channel capacity for workflow events.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Tunable parameters of the orchestration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between fetches while a job is actively processing.
    pub poll_interval: Duration,
    /// Capacity of the [`WorkflowEvent`](crate::events::WorkflowEvent)
    /// channel. Slow subscribers lag rather than block the workflow.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
