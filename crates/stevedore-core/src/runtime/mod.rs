//! Boundary to the container runtime.
//!
//! The daemon talks to the runtime only through [`ContainerRuntime`]; the docker adapter lives in
//! its own crate and tests use an in-memory fake.
mod error;
pub use error::{RuntimeError, RuntimeResult};

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::Serialize;

use stevedore_model::{ContainerStatus, Env, Labels};

/// Container as listed or inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub id: String,
    /// Name without the leading slash.
    pub name: String,
    /// Image reference or id.
    pub image: String,
    pub status: ContainerStatus,
    pub labels: Labels,
    /// Last start time, if the container was ever started.
    pub started_at: Option<DateTime<Utc>>,
}

/// Server-side list filter; all conditions must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Accepted statuses; empty means any status.
    pub statuses: Vec<ContainerStatus>,
    /// `key` or `key=value` label conditions.
    pub labels: Vec<String>,
}

impl ContainerFilter {
    pub fn status(status: ContainerStatus) -> Self {
        Self {
            statuses: vec![status],
            labels: Vec::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Evaluate the filter locally against a container.
    pub fn matches(&self, c: &ContainerInfo) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&c.status);
        let labels_ok = self.labels.iter().all(|cond| match cond.split_once('=') {
            Some((k, v)) => c.labels.get(k) == Some(v),
            None => c.labels.get(cond).is_some(),
        });
        status_ok && labels_ok
    }
}

/// Command execution request inside a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Command line; split with shell word rules by the runtime adapter.
    pub command: String,
    /// User to run as; empty means the container's default user.
    pub user: String,
    pub environment: Env,
    pub workdir: Option<String>,
}

/// Result of an executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    /// Interleaved stdout and stderr.
    pub output: Vec<u8>,
}

/// Container lifecycle actions the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerAction {
    Start,
    Die,
    Pause,
    Unpause,
}

impl ContainerAction {
    pub const ALL: [ContainerAction; 4] = [
        ContainerAction::Start,
        ContainerAction::Die,
        ContainerAction::Pause,
        ContainerAction::Unpause,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Die => "die",
            ContainerAction::Pause => "pause",
            ContainerAction::Unpause => "unpause",
        }
    }

    /// Map a runtime action name; anything else is irrelevant to the engine.
    pub fn from_action(action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == action)
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub action: ContainerAction,
    pub container_id: String,
    /// Actor attributes; for containers these include the labels.
    pub attributes: Labels,
    pub time: DateTime<Utc>,
}

/// Operations the daemon needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// List containers matching `filter`, in runtime order.
    async fn list_containers(&self, filter: &ContainerFilter) -> RuntimeResult<Vec<ContainerInfo>>;

    /// Inspect one container.
    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo>;

    /// Labels of the image the container was created from.
    async fn image_labels(&self, container_id: &str) -> RuntimeResult<Labels>;

    /// Run a command in a running container and wait for it to finish.
    async fn exec(&self, container_id: &str, request: &ExecRequest) -> RuntimeResult<ExecOutput>;

    /// Container lifecycle events (`start`, `die`, `pause`, `unpause`) since `since`.
    ///
    /// The stream is potentially infinite.
    fn events(&self, since: DateTime<Utc>) -> BoxStream<'static, RuntimeResult<RuntimeEvent>>;

    /// Current status of a container, `None` if it no longer exists.
    async fn container_status(&self, id: &str) -> RuntimeResult<Option<ContainerStatus>> {
        match self.inspect_container(id).await {
            Ok(info) => Ok(Some(info.status)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(status: ContainerStatus, labels: &[(&str, &str)]) -> ContainerInfo {
        ContainerInfo {
            id: "c1".into(),
            name: "c1".into(),
            image: "img".into(),
            status,
            labels: labels.iter().copied().collect(),
            started_at: None,
        }
    }

    #[test]
    fn filter_matches_status_and_labels() {
        let c = container(ContainerStatus::Running, &[("a", "1"), ("b", "2")]);

        assert!(ContainerFilter::default().matches(&c));
        assert!(ContainerFilter::status(ContainerStatus::Running).matches(&c));
        assert!(!ContainerFilter::status(ContainerStatus::Paused).matches(&c));
        assert!(ContainerFilter::status(ContainerStatus::Running)
            .with_labels(["a=1", "b"])
            .matches(&c));
        assert!(!ContainerFilter::default().with_labels(["a=2"]).matches(&c));
        assert!(!ContainerFilter::default().with_labels(["c"]).matches(&c));
    }

    #[test]
    fn only_lifecycle_actions_are_mapped() {
        assert_eq!(ContainerAction::from_action("start"), Some(ContainerAction::Start));
        assert_eq!(ContainerAction::from_action("unpause"), Some(ContainerAction::Unpause));
        assert_eq!(ContainerAction::from_action("exec_create"), None);
        assert_eq!(ContainerAction::from_action("kill"), None);
    }
}
