//! Job scheduler.
//!
//! Owns every scheduled job. Each active job runs its own timer task which computes the next
//! fire time from the trigger, sleeps, checks the target container and hands the command to a
//! bounded worker pool. Pausing a job cancels its timer; resuming starts a new one.
//!
//! All job records live behind one mutex which is never held across an await point, so a
//! firing always observes a complete record (container id and paused flag) even while the
//! engine reassigns jobs.
mod entry;
mod runner;

use entry::JobEntry;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use stevedore_model::{JobDefinition, JobId};

use crate::events::{EventBus, JobEvent, JobEventKind};
use crate::metrics::MetricsHandle;
use crate::runtime::ContainerRuntime;

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of commands that may run at the same time across all jobs.
    pub pool_size: usize,
    /// A firing that starts later than this after its scheduled time is dropped as missed.
    pub misfire_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            misfire_grace: Duration::from_secs(1),
        }
    }
}

/// Read-only view of a scheduled job.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub container_id: String,
    pub paused: bool,
    /// `None` while paused.
    pub next_run: Option<DateTime<Utc>>,
    pub previous_run: Option<DateTime<Utc>>,
    /// Currently running instances.
    pub running: u32,
    pub definition: JobDefinition,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    cfg: SchedulerConfig,
    runtime: Arc<dyn ContainerRuntime>,
    bus: EventBus,
    metrics: MetricsHandle,
    jobs: Mutex<BTreeMap<JobId, JobEntry>>,
    pool: Arc<Semaphore>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Scheduler {
    /// Create a scheduler; must be called within a tokio runtime.
    pub fn new(
        cfg: SchedulerConfig,
        runtime: Arc<dyn ContainerRuntime>,
        bus: EventBus,
        metrics: MetricsHandle,
    ) -> Self {
        let pool = Arc::new(Semaphore::new(cfg.pool_size.max(1)));
        Self {
            inner: Arc::new(Inner {
                cfg,
                runtime,
                bus,
                metrics,
                jobs: Mutex::new(BTreeMap::new()),
                pool,
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Register jobs for a container, replacing jobs with the same id.
    ///
    /// Returns the ids of the registered jobs.
    pub fn add(
        &self,
        container_id: &str,
        definitions: &BTreeMap<String, JobDefinition>,
        paused: bool,
    ) -> Vec<JobId> {
        let mut jobs = self.inner.jobs();
        let mut ids = Vec::with_capacity(definitions.len());

        for definition in definitions.values() {
            let id = JobId::derive(definition.service_identity.as_ref(), container_id, &definition.name);
            if let Some(mut old) = jobs.remove(&id) {
                old.stop_timer();
                debug!(job_id = %id, "replacing existing job");
            }

            let mut entry = JobEntry::new(Arc::new(definition.clone()), container_id.to_string());
            if !paused {
                entry.next_run = definition.trigger.next_fire(None, Utc::now());
                entry.timer = Some(self.inner.spawn_timer(id.clone()));
            } else {
                entry.paused = true;
            }

            info!(
                container = container_id,
                job = %definition.name,
                job_id = %id,
                paused,
                "job added"
            );
            self.inner.publish(
                &id,
                &entry,
                JobEventKind::Added {
                    paused,
                    next_run: entry.next_run,
                },
            );
            jobs.insert(id.clone(), entry);
            ids.push(id);
        }
        ids
    }

    /// Remove a job; returns `false` if it does not exist.
    pub fn remove(&self, id: &JobId) -> bool {
        let mut jobs = self.inner.jobs();
        self.inner.remove_locked(&mut jobs, id)
    }

    pub fn get(&self, id: &JobId) -> Option<ScheduledJob> {
        self.inner.jobs().get(id).map(|e| e.snapshot(id))
    }

    /// All jobs ordered by id.
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.inner
            .jobs()
            .iter()
            .map(|(id, e)| e.snapshot(id))
            .collect()
    }

    pub fn find_by_container(&self, container_id: &str) -> Vec<ScheduledJob> {
        self.inner
            .jobs()
            .iter()
            .filter(|(_, e)| e.container_id == container_id)
            .map(|(id, e)| e.snapshot(id))
            .collect()
    }

    /// Suspend future firings; returns `true` if the job was active.
    pub fn pause(&self, id: &JobId) -> bool {
        let mut jobs = self.inner.jobs();
        match jobs.get_mut(id) {
            Some(entry) => self.inner.pause_entry(id, entry),
            None => false,
        }
    }

    /// Reactivate a paused job; returns `true` if the job was paused.
    pub fn resume(&self, id: &JobId) -> bool {
        let mut jobs = self.inner.jobs();
        match jobs.get_mut(id) {
            Some(entry) => self.inner.resume_entry(id, entry),
            None => false,
        }
    }

    /// Bind a job to another container, keeping its id and trigger.
    pub fn reassign_container(&self, id: &JobId, container_id: &str) -> bool {
        let mut jobs = self.inner.jobs();
        match jobs.get_mut(id) {
            Some(entry) => {
                self.inner.reassign_entry(id, entry, container_id);
                true
            }
            None => false,
        }
    }

    /// Move every job of `from` to `to` and pause or resume them to match `to`'s state.
    ///
    /// Happens under a single lock, so no firing observes a partially moved job set.
    pub fn reassign_all(&self, from: &str, to: &str, paused: bool) -> usize {
        let mut jobs = self.inner.jobs();
        let mut moved = 0;
        for (id, entry) in jobs.iter_mut().filter(|(_, e)| e.container_id == from) {
            self.inner.reassign_entry(id, entry, to);
            if paused {
                self.inner.pause_entry(id, entry);
            } else {
                self.inner.resume_entry(id, entry);
            }
            moved += 1;
        }
        moved
    }

    /// Remove every job of a container.
    pub fn remove_container(&self, container_id: &str) -> usize {
        let mut jobs = self.inner.jobs();
        let ids: Vec<JobId> = jobs
            .iter()
            .filter(|(_, e)| e.container_id == container_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.inner.remove_locked(&mut jobs, id);
        }
        ids.len()
    }

    /// Pause every job of a container; returns how many were active.
    pub fn pause_container(&self, container_id: &str) -> usize {
        let mut jobs = self.inner.jobs();
        let mut paused = 0;
        for (id, entry) in jobs.iter_mut().filter(|(_, e)| e.container_id == container_id) {
            if self.inner.pause_entry(id, entry) {
                paused += 1;
            }
        }
        paused
    }

    /// Resume every job of a container; returns how many were paused.
    pub fn resume_container(&self, container_id: &str) -> usize {
        let mut jobs = self.inner.jobs();
        let mut resumed = 0;
        for (id, entry) in jobs.iter_mut().filter(|(_, e)| e.container_id == container_id) {
            if self.inner.resume_entry(id, entry) {
                resumed += 1;
            }
        }
        resumed
    }

    pub fn len(&self) -> usize {
        self.inner.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs().is_empty()
    }

    /// Stop all timers and wait up to `grace` for running commands.
    ///
    /// Returns `false` if commands were still running when the grace period ended.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();

        match tokio::time::timeout(grace, self.inner.tracker.wait()).await {
            Ok(()) => {
                info!("scheduler stopped");
                true
            }
            Err(_) => {
                warn!(
                    in_flight = self.inner.tracker.len(),
                    "grace period elapsed, abandoning running jobs"
                );
                false
            }
        }
    }
}

impl Inner {
    fn jobs(&self) -> MutexGuard<'_, BTreeMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, id: &JobId, entry: &JobEntry, kind: JobEventKind) {
        self.bus.publish(JobEvent {
            job_id: id.clone(),
            job_name: entry.definition.name.clone(),
            container_id: entry.container_id.clone(),
            at: Utc::now(),
            kind,
        });
    }

    fn remove_locked(&self, jobs: &mut BTreeMap<JobId, JobEntry>, id: &JobId) -> bool {
        match jobs.remove(id) {
            Some(mut entry) => {
                entry.stop_timer();
                info!(
                    container = %entry.container_id,
                    job = %entry.definition.name,
                    job_id = %id,
                    "job removed"
                );
                self.publish(id, &entry, JobEventKind::Removed);
                true
            }
            None => {
                info!(job_id = %id, "job to remove does not exist");
                false
            }
        }
    }

    fn pause_entry(&self, id: &JobId, entry: &mut JobEntry) -> bool {
        if entry.paused {
            return false;
        }
        entry.stop_timer();
        entry.paused = true;
        entry.next_run = None;
        self.publish(id, entry, JobEventKind::Paused);
        true
    }

    fn resume_entry(self: &Arc<Self>, id: &JobId, entry: &mut JobEntry) -> bool {
        if !entry.paused {
            return false;
        }
        entry.paused = false;
        entry.next_run = entry.definition.trigger.next_fire(entry.previous, Utc::now());
        entry.timer = Some(self.spawn_timer(id.clone()));
        self.publish(id, entry, JobEventKind::Resumed);
        true
    }

    fn reassign_entry(&self, id: &JobId, entry: &mut JobEntry, container_id: &str) {
        if entry.container_id == container_id {
            return;
        }
        let from = std::mem::replace(&mut entry.container_id, container_id.to_string());
        info!(
            job = %entry.definition.name,
            job_id = %id,
            from = %from,
            to = container_id,
            "job reassigned"
        );
        self.publish(id, entry, JobEventKind::Reassigned { from });
    }
}
