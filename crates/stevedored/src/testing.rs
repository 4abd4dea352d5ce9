//! Static container runtime for daemon tests.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

use stevedore_core::runtime::{
    ContainerFilter, ContainerInfo, ContainerRuntime, ExecOutput, ExecRequest, RuntimeError,
    RuntimeEvent, RuntimeResult,
};
use stevedore_model::{ContainerStatus, Labels};

#[derive(Default)]
pub struct StaticRuntime {
    pub containers: Vec<ContainerInfo>,
    pub image_labels: HashMap<String, Labels>,
}

impl StaticRuntime {
    pub fn with(mut self, id: &str, status: ContainerStatus, image_labels: &[(&str, &str)]) -> Self {
        self.containers.push(ContainerInfo {
            id: id.to_string(),
            name: id.to_string(),
            image: "img".to_string(),
            status,
            labels: Labels::new(),
            started_at: None,
        });
        self.image_labels
            .insert(id.to_string(), image_labels.iter().copied().collect());
        self
    }
}

#[async_trait]
impl ContainerRuntime for StaticRuntime {
    async fn list_containers(&self, filter: &ContainerFilter) -> RuntimeResult<Vec<ContainerInfo>> {
        Ok(self.containers.iter().filter(|c| filter.matches(c)).cloned().collect())
    }

    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo> {
        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn image_labels(&self, container_id: &str) -> RuntimeResult<Labels> {
        self.image_labels
            .get(container_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(container_id.to_string()))
    }

    async fn exec(&self, _container_id: &str, _request: &ExecRequest) -> RuntimeResult<ExecOutput> {
        Ok(ExecOutput {
            exit_code: 0,
            output: Vec::new(),
        })
    }

    fn events(&self, _since: DateTime<Utc>) -> BoxStream<'static, RuntimeResult<RuntimeEvent>> {
        stream::empty().boxed()
    }
}
