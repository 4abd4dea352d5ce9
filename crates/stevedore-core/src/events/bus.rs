use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, trace};

use crate::events::JobEvent;

/// Consumer of job events.
///
/// Every subscriber gets its own bounded queue and worker task, so a slow subscriber never
/// blocks the scheduler. Events that don't fit into the queue are dropped.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &JobEvent);

    /// Subscriber name used in logs.
    fn name(&self) -> &'static str;

    fn queue_capacity(&self) -> usize {
        1024
    }
}

struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<JobEvent>>,
}

/// Fan-out of job events to subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    lanes: Arc<Vec<Lane>>,
}

impl EventBus {
    /// Spawn one worker per subscriber; must be called within a tokio runtime.
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let lanes = subscribers
            .into_iter()
            .map(|sub| {
                let (tx, mut rx) = mpsc::channel::<Arc<JobEvent>>(sub.queue_capacity().max(1));
                let name = sub.name();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        sub.on_event(&event).await;
                    }
                    trace!(subscriber = name, "subscriber worker stopped");
                });
                Lane { name, tx }
            })
            .collect();
        Self {
            lanes: Arc::new(lanes),
        }
    }

    /// Bus without subscribers.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: JobEvent) {
        if self.lanes.is_empty() {
            return;
        }
        let event = Arc::new(event);
        for lane in self.lanes.iter() {
            if let Err(e) = lane.tx.try_send(Arc::clone(&event)) {
                error!(
                    subscriber = lane.name,
                    job = %event.job_name,
                    reason = %e,
                    "event dropped for a subscriber (queue full or worker closed)"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::JobEventKind;
    use crate::testing::Recorder;
    use chrono::Utc;

    fn event(name: &str) -> JobEvent {
        JobEvent {
            job_id: name.into(),
            job_name: name.to_string(),
            container_id: "c1".into(),
            at: Utc::now(),
            kind: JobEventKind::Removed,
        }
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber_in_order() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let bus = EventBus::new(vec![a.clone(), b.clone()]);

        bus.publish(event("one"));
        bus.publish(event("two"));

        for rec in [&a, &b] {
            rec.wait_for(2).await;
            let names: Vec<_> = rec.events().iter().map(|e| e.job_name.clone()).collect();
            assert_eq!(names, ["one", "two"]);
        }
    }

    #[tokio::test]
    async fn empty_bus_accepts_events() {
        EventBus::empty().publish(event("ignored"));
    }
}
