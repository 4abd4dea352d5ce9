use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use stevedore_model::{JobDefinition, JobId};

use crate::scheduler::ScheduledJob;

/// Mutable scheduler record of one job.
pub(super) struct JobEntry {
    pub(super) definition: Arc<JobDefinition>,
    pub(super) container_id: String,
    pub(super) paused: bool,
    /// Last scheduled fire time, without jitter.
    pub(super) previous: Option<DateTime<Utc>>,
    pub(super) next_run: Option<DateTime<Utc>>,
    pub(super) running: Arc<AtomicU32>,
    /// Cancels the timer task; `None` while paused.
    pub(super) timer: Option<CancellationToken>,
}

impl JobEntry {
    pub(super) fn new(definition: Arc<JobDefinition>, container_id: String) -> Self {
        Self {
            definition,
            container_id,
            paused: false,
            previous: None,
            next_run: None,
            running: Arc::new(AtomicU32::new(0)),
            timer: None,
        }
    }

    pub(super) fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    pub(super) fn snapshot(&self, id: &JobId) -> ScheduledJob {
        ScheduledJob {
            id: id.clone(),
            container_id: self.container_id.clone(),
            paused: self.paused,
            next_run: self.next_run,
            previous_run: self.previous,
            running: self.running.load(Ordering::SeqCst),
            definition: (*self.definition).clone(),
        }
    }
}

/// Holds one slot of a job's `max_instances`; released on drop.
pub(super) struct InstanceSlot(Arc<AtomicU32>);

impl InstanceSlot {
    /// Take a slot unless `max` instances are already running.
    pub(super) fn acquire(running: &Arc<AtomicU32>, max: u32) -> Option<Self> {
        running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(running)))
    }
}

impl Drop for InstanceSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
