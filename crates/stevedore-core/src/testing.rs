//! In-memory runtime and event recorder for tests.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::{Notify, mpsc};

use stevedore_model::{ContainerStatus, Labels};

use crate::events::{JobEvent, Subscribe};
use crate::runtime::{
    ContainerFilter, ContainerInfo, ContainerRuntime, ExecOutput, ExecRequest, RuntimeError,
    RuntimeEvent, RuntimeResult,
};

pub fn container(id: &str, status: ContainerStatus, labels: &[(&str, &str)]) -> ContainerInfo {
    ContainerInfo {
        id: id.to_string(),
        name: format!("{id}-name"),
        image: "app:latest".to_string(),
        status,
        labels: labels.iter().copied().collect(),
        started_at: None,
    }
}

#[derive(Default)]
struct State {
    containers: Vec<ContainerInfo>,
    image_labels: HashMap<String, Labels>,
    exec_output: Option<ExecOutput>,
    exec_error: Option<String>,
    exec_latency: Duration,
    execs: Vec<(String, ExecRequest)>,
}

/// Scripted [`ContainerRuntime`].
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
    status_queries: AtomicUsize,
    image_queries: AtomicUsize,
    events_tx: Mutex<Option<mpsc::UnboundedSender<RuntimeResult<RuntimeEvent>>>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn put(&self, info: ContainerInfo) {
        let mut st = self.state();
        match st.containers.iter_mut().find(|c| c.id == info.id) {
            Some(existing) => *existing = info,
            None => st.containers.push(info),
        }
    }

    pub fn set_status(&self, id: &str, status: ContainerStatus) {
        if let Some(c) = self.state().containers.iter_mut().find(|c| c.id == id) {
            c.status = status;
        }
    }

    pub fn forget(&self, id: &str) {
        self.state().containers.retain(|c| c.id != id);
    }

    pub fn set_image_labels(&self, id: &str, labels: &[(&str, &str)]) {
        self.state()
            .image_labels
            .insert(id.to_string(), labels.iter().copied().collect());
    }

    pub fn set_exec_output(&self, exit_code: i64, output: &str) {
        self.state().exec_output = Some(ExecOutput {
            exit_code,
            output: output.as_bytes().to_vec(),
        });
    }

    pub fn fail_exec(&self, message: &str) {
        self.state().exec_error = Some(message.to_string());
    }

    pub fn set_exec_latency(&self, latency: Duration) {
        self.state().exec_latency = latency;
    }

    pub fn execs(&self) -> Vec<(String, ExecRequest)> {
        self.state().execs.clone()
    }

    pub fn exec_count(&self) -> usize {
        self.state().execs.len()
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn image_queries(&self) -> usize {
        self.image_queries.load(Ordering::SeqCst)
    }

    /// Push an event into the stream returned by the last `events` call.
    pub fn emit(&self, event: RuntimeResult<RuntimeEvent>) {
        if let Some(tx) = self.events_tx.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.events_tx.lock().unwrap().is_some()
    }

    /// End the current event stream.
    pub fn close_events(&self) {
        self.events_tx.lock().unwrap().take();
    }

    fn find(&self, id: &str) -> RuntimeResult<ContainerInfo> {
        self.state()
            .containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self, filter: &ContainerFilter) -> RuntimeResult<Vec<ContainerInfo>> {
        Ok(self
            .state()
            .containers
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo> {
        self.find(id)
    }

    async fn image_labels(&self, container_id: &str) -> RuntimeResult<Labels> {
        self.image_queries.fetch_add(1, Ordering::SeqCst);
        self.find(container_id)?;
        Ok(self
            .state()
            .image_labels
            .get(container_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn exec(&self, container_id: &str, request: &ExecRequest) -> RuntimeResult<ExecOutput> {
        let (latency, output, error) = {
            let mut st = self.state();
            st.execs.push((container_id.to_string(), request.clone()));
            (st.exec_latency, st.exec_output.clone(), st.exec_error.clone())
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(message) = error {
            return Err(RuntimeError::Api(message));
        }
        Ok(output.unwrap_or(ExecOutput {
            exit_code: 0,
            output: Vec::new(),
        }))
    }

    fn events(&self, _since: DateTime<Utc>) -> BoxStream<'static, RuntimeResult<RuntimeEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events_tx.lock().unwrap() = Some(tx);
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|ev| (ev, rx)) }).boxed()
    }

    async fn container_status(&self, id: &str) -> RuntimeResult<Option<ContainerStatus>> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.find(id).ok().map(|c| c.status))
    }
}

/// Subscriber that keeps every event it receives.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<JobEvent>>,
    notify: Notify,
}

impl Recorder {
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind.name() == kind)
            .count()
    }

    /// Wait until at least `n` events arrived; panics after five seconds.
    pub async fn wait_for(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                if self.events.lock().unwrap().len() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for events");
    }

    /// Wait until at least one event of `kind` arrived.
    pub async fn wait_for_kind(&self, kind: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                if self.count(kind) > 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for a '{kind}' event"));
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &JobEvent) {
        self.events.lock().unwrap().push(event.clone());
        self.notify.notify_waiters();
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}
