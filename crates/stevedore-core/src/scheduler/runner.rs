use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use stevedore_model::{ContainerStatus, JobDefinition, JobId};

use crate::events::{JobEvent, JobEventKind};
use crate::metrics::{JobOutcome, SkipReason};
use crate::runtime::ExecRequest;
use crate::scheduler::Inner;
use crate::scheduler::entry::InstanceSlot;

/// Job state captured at fire time.
struct Firing {
    definition: Arc<JobDefinition>,
    container_id: String,
    running: Arc<AtomicU32>,
    scheduled: DateTime<Utc>,
}

impl Inner {
    pub(super) fn spawn_timer(self: &Arc<Self>, id: JobId) -> CancellationToken {
        let token = self.shutdown.child_token();
        let inner = Arc::clone(self);
        let cancel = token.clone();
        self.tracker.spawn(async move { inner.run_timer(id, cancel).await });
        token
    }

    async fn run_timer(self: Arc<Self>, id: JobId, cancel: CancellationToken) {
        loop {
            let Some((fire_at, jitter)) = self.plan_next(&id, &cancel) else {
                return;
            };
            let target = TimeDelta::from_std(jitter)
                .ok()
                .and_then(|delay| fire_at.checked_add_signed(delay))
                .unwrap_or(fire_at);
            let wait = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }

            if !self.mark_fired(&id, &cancel, fire_at) {
                return;
            }
            self.fire(&id, target).await;
        }
    }

    /// Next fire time and jitter delay; `None` stops the timer.
    ///
    /// A trigger without further fire times removes its job.
    fn plan_next(&self, id: &JobId, cancel: &CancellationToken) -> Option<(DateTime<Utc>, Duration)> {
        let mut jobs = self.jobs();
        if cancel.is_cancelled() {
            return None;
        }
        let entry = jobs.get_mut(id)?;
        let next = entry
            .next_run
            .or_else(|| entry.definition.trigger.next_fire(entry.previous, Utc::now()));
        entry.next_run = next;

        let Some(fire_at) = next else {
            debug!(job_id = %id, "trigger has no further fire times");
            self.remove_locked(&mut jobs, id);
            return None;
        };

        let jitter = match entry.definition.jitter {
            Some(max) if max > 0 && !entry.definition.trigger.is_one_shot() => {
                Duration::from_secs(rand::thread_rng().gen_range(0..=max))
            }
            _ => Duration::ZERO,
        };
        Some((fire_at, jitter))
    }

    /// Record `fire_at` as the previous fire time; `false` if the timer is stale.
    fn mark_fired(&self, id: &JobId, cancel: &CancellationToken, fire_at: DateTime<Utc>) -> bool {
        let mut jobs = self.jobs();
        if cancel.is_cancelled() {
            return false;
        }
        match jobs.get_mut(id) {
            Some(entry) => {
                entry.previous = Some(fire_at);
                entry.next_run = None;
                true
            }
            None => false,
        }
    }

    fn is_missed(&self, scheduled: DateTime<Utc>) -> bool {
        let late = Utc::now() - scheduled;
        late.to_std().is_ok_and(|late| late > self.cfg.misfire_grace)
    }

    fn snapshot(&self, id: &JobId, scheduled: DateTime<Utc>) -> Option<Firing> {
        let jobs = self.jobs();
        let entry = jobs.get(id).filter(|e| !e.paused)?;
        Some(Firing {
            definition: Arc::clone(&entry.definition),
            container_id: entry.container_id.clone(),
            running: Arc::clone(&entry.running),
            scheduled,
        })
    }

    fn publish_firing(&self, id: &JobId, firing: &Firing, kind: JobEventKind) {
        self.bus.publish(JobEvent {
            job_id: id.clone(),
            job_name: firing.definition.name.clone(),
            container_id: firing.container_id.clone(),
            at: Utc::now(),
            kind,
        });
    }

    fn skip(&self, id: &JobId, firing: &Firing, reason: SkipReason, kind: JobEventKind) {
        self.metrics
            .record_job_skipped(firing.definition.trigger.kind().as_str(), reason);
        self.publish_firing(id, firing, kind);
    }

    /// Check the target container and hand the command to the worker pool.
    #[instrument(level = "debug", skip(self, id), fields(job_id = %id))]
    async fn fire(self: &Arc<Self>, id: &JobId, scheduled: DateTime<Utc>) {
        let Some(firing) = self.snapshot(id, scheduled) else {
            return;
        };

        if self.is_missed(scheduled) {
            self.skip(id, &firing, SkipReason::Missed, JobEventKind::Missed { scheduled });
            return;
        }

        match self.runtime.container_status(&firing.container_id).await {
            Ok(Some(ContainerStatus::Running)) => {}
            Ok(Some(ContainerStatus::Paused)) => {
                info!(
                    container = %firing.container_id,
                    job = %firing.definition.name,
                    "container is paused, skipping execution"
                );
                self.skip(id, &firing, SkipReason::Paused, JobEventKind::SkippedPaused);
                return;
            }
            Ok(status) => {
                let status = status.map_or("gone", |s| s.as_str());
                self.remove_stale(id, &firing.container_id);
                self.skip(
                    id,
                    &firing,
                    SkipReason::Stale,
                    JobEventKind::Errored {
                        error: format!(
                            "container {} is not running ({status}), job removed",
                            firing.container_id
                        ),
                    },
                );
                return;
            }
            Err(e) => {
                self.metrics.record_runtime_error("inspect");
                self.publish_firing(id, &firing, JobEventKind::Errored { error: e.to_string() });
                return;
            }
        }

        let max = firing.definition.max_instances;
        let Some(slot) = InstanceSlot::acquire(&firing.running, max) else {
            self.skip(
                id,
                &firing,
                SkipReason::MaxInstances,
                JobEventKind::MaxInstances { max_instances: max },
            );
            return;
        };

        let inner = Arc::clone(self);
        let id = id.clone();
        self.tracker.spawn(async move { inner.execute(id, firing, slot).await });
    }

    /// Drop a job whose container vanished, unless it was reassigned meanwhile.
    fn remove_stale(&self, id: &JobId, container_id: &str) {
        let mut jobs = self.jobs();
        if jobs.get(id).is_some_and(|e| e.container_id == container_id) {
            warn!(job_id = %id, container = container_id, "removing stale job");
            self.remove_locked(&mut jobs, id);
        }
    }

    async fn execute(self: Arc<Self>, id: JobId, firing: Firing, slot: InstanceSlot) {
        let permit = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            permit = Arc::clone(&self.pool).acquire_owned() => permit,
        };
        let Ok(_permit) = permit else {
            return;
        };

        // The pool may have been saturated for a while.
        if self.is_missed(firing.scheduled) {
            self.skip(
                &id,
                &firing,
                SkipReason::Missed,
                JobEventKind::Missed {
                    scheduled: firing.scheduled,
                },
            );
            return;
        }

        let def = &firing.definition;
        let trigger = def.trigger.kind().as_str();
        let request = ExecRequest {
            command: def.command.clone(),
            user: def.user.clone(),
            environment: def.environment.clone(),
            workdir: def.workdir.clone(),
        };

        info!(container = %firing.container_id, job = %def.name, "executing job");
        self.metrics.record_job_started(trigger);
        let started = Instant::now();
        let result = self.runtime.exec(&firing.container_id, &request).await;
        let duration = started.elapsed();
        drop(slot);

        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(out) => {
                self.metrics.record_job_completed(
                    trigger,
                    JobOutcome::from_exit_code(out.exit_code),
                    duration_ms,
                );
                self.publish_firing(
                    &id,
                    &firing,
                    JobEventKind::Executed {
                        command: def.command.clone(),
                        exit_code: out.exit_code,
                        output: out.output,
                        duration,
                    },
                );
            }
            Err(e) => {
                error!(container = %firing.container_id, job = %def.name, error = %e, "execution failed");
                self.metrics.record_runtime_error("exec");
                self.metrics
                    .record_job_completed(trigger, JobOutcome::Error, duration_ms);
                self.publish_firing(&id, &firing, JobEventKind::Errored { error: e.to_string() });
            }
        }
    }
}
