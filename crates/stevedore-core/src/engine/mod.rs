//! Reconciliation engine.
//!
//! Consumes container lifecycle events one at a time and keeps the service lock table and the
//! scheduler in line with them: one active job set per service identity, jobs following their
//! owner through pause, unpause, restart and replacement.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use stevedore_model::{ContainerStatus, ServiceIdentity};

use crate::error::{CoreError, CoreResult};
use crate::labels::LabelParser;
use crate::locks::ServiceLocks;
use crate::metrics::MetricsHandle;
use crate::runtime::{ContainerAction, ContainerFilter, ContainerInfo, ContainerRuntime, RuntimeEvent};
use crate::scheduler::Scheduler;

/// Delay before subscribing again after the event stream failed or ended.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Replacement search order when an owner dies.
const DIE_CANDIDATES: [ContainerStatus; 4] = [
    ContainerStatus::Running,
    ContainerStatus::Restarting,
    ContainerStatus::Paused,
    ContainerStatus::Created,
];

/// Replacement search order when an owner is paused.
const PAUSE_CANDIDATES: [ContainerStatus; 2] = [ContainerStatus::Running, ContainerStatus::Restarting];

pub struct Engine {
    runtime: Arc<dyn ContainerRuntime>,
    parser: LabelParser,
    scheduler: Scheduler,
    locks: ServiceLocks,
    metrics: MetricsHandle,
}

impl Engine {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        parser: LabelParser,
        scheduler: Scheduler,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            runtime,
            parser,
            scheduler,
            locks: ServiceLocks::new(),
            metrics,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn locks(&self) -> &ServiceLocks {
        &self.locks
    }

    /// Register jobs of all running and paused containers.
    ///
    /// Returns the watermark to subscribe to events from: the latest container start time.
    pub async fn inspect_existing(&mut self) -> CoreResult<DateTime<Utc>> {
        let filter = ContainerFilter {
            statuses: vec![ContainerStatus::Running, ContainerStatus::Paused],
            labels: Vec::new(),
        };
        let containers = self.runtime.list_containers(&filter).await?;
        info!(containers = containers.len(), "inspecting existing containers");

        let mut since = None;
        for container in &containers {
            since = since.max(container.started_at);
            if let Err(e) = self.register(container).await {
                self.report(ContainerAction::Start, &container.id, e);
            }
        }
        Ok(since.unwrap_or_else(Utc::now))
    }

    /// Apply one lifecycle event; failures are logged and never abort the caller.
    ///
    /// Cached labels of the container are dropped first, so the event is handled with fresh ones.
    #[instrument(level = "debug", skip(self, event), fields(action = %event.action, container = %event.container_id))]
    pub async fn handle(&mut self, event: &RuntimeEvent) {
        let id = event.container_id.as_str();
        self.parser.invalidate(id);
        let result = match event.action {
            ContainerAction::Start => self.on_start(id).await,
            ContainerAction::Die => self.on_die(id).await,
            ContainerAction::Pause => self.on_pause(id).await,
            ContainerAction::Unpause => self.on_unpause(id).await,
        };
        if let Err(e) = result {
            self.report(event.action, id, e);
        }
    }

    /// Consume lifecycle events until `shutdown` is cancelled.
    ///
    /// A failed or ended stream is subscribed to again from the time of the last seen event.
    pub async fn run(&mut self, since: DateTime<Utc>, shutdown: CancellationToken) {
        let mut since = since;
        info!(%since, "listening to container events");

        loop {
            let mut events = self.runtime.events(since);
            loop {
                let next = tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("event loop stopped");
                        return;
                    }
                    next = events.next() => next,
                };
                match next {
                    Some(Ok(event)) => {
                        since = since.max(event.time);
                        self.handle(&event).await;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "event stream failed, subscribing again");
                        self.metrics.record_runtime_error("events");
                        break;
                    }
                    None => {
                        warn!("event stream ended, subscribing again");
                        break;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("event loop stopped");
                    return;
                }
                _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
            }
        }
    }

    fn report(&self, action: ContainerAction, container_id: &str, err: CoreError) {
        match err {
            CoreError::Invariant(e) => error!(
                %action,
                container = container_id,
                error = %e,
                "service lock table out of sync with scheduled jobs, this is a bug"
            ),
            CoreError::Runtime(e) => {
                self.metrics.record_runtime_error(action.as_str());
                error!(%action, container = container_id, error = %e, "runtime call failed while handling event");
            }
            other => error!(%action, container = container_id, error = %other, "failed to handle event"),
        }
    }

    async fn on_start(&mut self, container_id: &str) -> CoreResult<()> {
        match self.runtime.inspect_container(container_id).await {
            Ok(info) => self.register(&info).await,
            Err(e) if e.is_not_found() => {
                debug!(container = container_id, "started container is already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register jobs of a started or already running container.
    async fn register(&mut self, container: &ContainerInfo) -> CoreResult<()> {
        let parsed = self.parser.parse(container).await?;
        if parsed.is_empty() {
            debug!(container = %container.id, "no jobs defined");
            return Ok(());
        }
        let paused = container.status == ContainerStatus::Paused;

        if let Some(identity) = parsed.identity.as_ref().filter(|_| parsed.flags.service()) {
            match self.locks.find_current_owner(identity).map(str::to_string) {
                None => {
                    info!(service = %identity, container = %container.id, "locking service");
                    self.locks.lock(identity.clone(), &container.id)?;
                }
                Some(owner) if owner == container.id => {}
                Some(owner) => {
                    if self.runtime.container_status(&owner).await? == Some(ContainerStatus::Paused) {
                        self.promote(identity, &owner, &container.id, paused)?;
                    } else {
                        info!(
                            service = %identity,
                            container = %container.id,
                            owner = %owner,
                            "service jobs are already hosted by another container"
                        );
                        return Ok(());
                    }
                }
            }
        }

        self.scheduler.add(&container.id, &parsed.jobs, paused);
        Ok(())
    }

    async fn on_die(&mut self, container_id: &str) -> CoreResult<()> {
        let Some(identity) = self.locks.identity_of(container_id).cloned() else {
            let removed = self.scheduler.remove_container(container_id);
            if removed > 0 {
                info!(container = container_id, jobs = removed, "removed jobs of stopped container");
            }
            return Ok(());
        };

        let was_paused = self
            .scheduler
            .find_by_container(container_id)
            .iter()
            .any(|job| job.paused);
        let statuses: Vec<ContainerStatus> = DIE_CANDIDATES
            .into_iter()
            .filter(|s| was_paused || *s != ContainerStatus::Paused)
            .collect();

        match self.find_replacement(&identity, container_id, &statuses).await? {
            Some(candidate) => {
                let paused = candidate.status == ContainerStatus::Paused;
                self.promote(&identity, container_id, &candidate.id, paused)
            }
            None => {
                let removed = self.scheduler.remove_container(container_id);
                self.locks.unlock(container_id);
                info!(
                    service = %identity,
                    container = container_id,
                    jobs = removed,
                    "no replacement found, service unlocked"
                );
                Ok(())
            }
        }
    }

    async fn on_pause(&mut self, container_id: &str) -> CoreResult<()> {
        if let Some(identity) = self.locks.identity_of(container_id).cloned() {
            if let Some(candidate) = self
                .find_replacement(&identity, container_id, &PAUSE_CANDIDATES)
                .await?
            {
                return self.promote(&identity, container_id, &candidate.id, false);
            }
        }
        let paused = self.scheduler.pause_container(container_id);
        if paused > 0 {
            info!(container = container_id, jobs = paused, "paused jobs");
        }
        Ok(())
    }

    async fn on_unpause(&mut self, container_id: &str) -> CoreResult<()> {
        if !self.locks.is_owner(container_id) {
            let container = match self.runtime.inspect_container(container_id).await {
                Ok(c) => c,
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let parsed = self.parser.parse(&container).await?;
            if let Some(identity) = parsed.identity.as_ref().filter(|_| parsed.flags.service()) {
                if let Some(owner) = self.locks.find_current_owner(identity).map(str::to_string) {
                    let owner_paused =
                        self.runtime.container_status(&owner).await? == Some(ContainerStatus::Paused);
                    if owner_paused {
                        self.promote(identity, &owner, container_id, false)?;
                    }
                }
            }
        }

        let resumed = self.scheduler.resume_container(container_id);
        if resumed > 0 {
            info!(container = container_id, jobs = resumed, "resumed jobs");
        }
        Ok(())
    }

    /// First container carrying `identity` in the given status order, other than `exclude`.
    async fn find_replacement(
        &self,
        identity: &ServiceIdentity,
        exclude: &str,
        statuses: &[ContainerStatus],
    ) -> CoreResult<Option<ContainerInfo>> {
        for status in statuses {
            let filter = ContainerFilter::status(*status).with_labels(identity.parts().iter().cloned());
            let found = self
                .runtime
                .list_containers(&filter)
                .await?
                .into_iter()
                .find(|c| c.id != exclude);
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Move a service's jobs and lock from `from` to `to`.
    fn promote(&mut self, identity: &ServiceIdentity, from: &str, to: &str, paused: bool) -> CoreResult<()> {
        let moved = self.scheduler.reassign_all(from, to, paused);
        self.locks.reassign(from, to)?;
        info!(service = %identity, from, to, jobs = moved, paused, "service jobs handed over");
        Ok(())
    }
}
