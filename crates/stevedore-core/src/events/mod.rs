//! Job listener events.
//!
//! Events are side effects only: they are published by the scheduler after state changes and
//! never drive scheduler or engine state.
mod bus;
pub use bus::{EventBus, Subscribe};

use std::time::Duration;

use chrono::{DateTime, Utc};

use stevedore_model::JobId;

/// Something that happened to a scheduled job.
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub job_id: JobId,
    pub job_name: String,
    pub container_id: String,
    pub at: DateTime<Utc>,
    pub kind: JobEventKind,
}

#[derive(Debug, Clone)]
pub enum JobEventKind {
    /// Job registered (or re-registered) with the scheduler.
    Added {
        paused: bool,
        next_run: Option<DateTime<Utc>>,
    },
    /// Job dropped from the scheduler.
    Removed,
    Paused,
    Resumed,
    /// Job moved to `container_id` from another container.
    Reassigned { from: String },
    /// Command finished inside the container.
    Executed {
        command: String,
        exit_code: i64,
        output: Vec<u8>,
        duration: Duration,
    },
    /// Command could not be run, or the job turned out to be stale.
    Errored { error: String },
    /// Firing happened too late and was dropped.
    Missed { scheduled: DateTime<Utc> },
    /// Firing was dropped because `max_instances` runs are still active.
    MaxInstances { max_instances: u32 },
    /// Firing was dropped because the container is paused.
    SkippedPaused,
}

impl JobEventKind {
    /// Short stable name, used by subscribers and tests.
    pub fn name(&self) -> &'static str {
        match self {
            JobEventKind::Added { .. } => "added",
            JobEventKind::Removed => "removed",
            JobEventKind::Paused => "paused",
            JobEventKind::Resumed => "resumed",
            JobEventKind::Reassigned { .. } => "reassigned",
            JobEventKind::Executed { .. } => "executed",
            JobEventKind::Errored { .. } => "errored",
            JobEventKind::Missed { .. } => "missed",
            JobEventKind::MaxInstances { .. } => "max_instances",
            JobEventKind::SkippedPaused => "skipped_paused",
        }
    }
}
