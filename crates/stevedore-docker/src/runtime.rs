use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::system::EventsOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::{debug, instrument, trace};

use stevedore_core::runtime::{
    ContainerFilter, ContainerInfo, ContainerRuntime, ExecOutput, ExecRequest, RuntimeError,
    RuntimeEvent, RuntimeResult,
};
use stevedore_model::Labels;

use crate::config::{DockerConfig, DockerHost};
use crate::convert::{
    api_error, container_from_inspect, event_filters, event_from_message, exec_options, list_filters,
};
use crate::error::{DockerError, DockerResult};

/// [`ContainerRuntime`] backed by the Docker Engine API.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Create a client; no request is sent until the first call (see [`DockerRuntime::ping`]).
    pub fn connect(cfg: &DockerConfig) -> DockerResult<Self> {
        cfg.host.check()?;
        let timeout = cfg.timeout.as_secs();
        let docker = match &cfg.host {
            #[cfg(unix)]
            DockerHost::Unix(path) => Docker::connect_with_unix(path, timeout, API_DEFAULT_VERSION)?,
            #[cfg(not(unix))]
            DockerHost::Unix(path) => return Err(DockerError::InvalidHost(format!("unix://{path}"))),
            DockerHost::Tcp(addr) => Docker::connect_with_http(addr, timeout, API_DEFAULT_VERSION)?,
        };
        debug!(host = %cfg.host, timeout_secs = timeout, "docker client configured");
        Ok(Self { docker })
    }

    /// Check that the daemon answers.
    pub async fn ping(&self) -> DockerResult<()> {
        self.docker.ping().await.map_err(DockerError::Connect)?;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, filter: &ContainerFilter) -> RuntimeResult<Vec<ContainerInfo>> {
        let opts = ListContainersOptions::<String> {
            all: true,
            filters: list_filters(filter),
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(opts))
            .await
            .map_err(|e| api_error(e, "containers"))?;

        // Summaries lack the start time, every container is inspected.
        let mut containers = Vec::with_capacity(summaries.len());
        for id in summaries.into_iter().filter_map(|s| s.id) {
            match self.inspect_container(&id).await {
                Ok(info) if filter.matches(&info) => containers.push(info),
                Ok(info) => trace!(container = %id, status = %info.status, "container changed state while listing"),
                Err(e) if e.is_not_found() => trace!(container = %id, "container vanished while listing"),
                Err(e) => return Err(e),
            }
        }
        Ok(containers)
    }

    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo> {
        let resp = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| api_error(e, id))?;
        container_from_inspect(resp)
    }

    async fn image_labels(&self, container_id: &str) -> RuntimeResult<Labels> {
        let container = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| api_error(e, container_id))?;
        let image_id = container
            .image
            .ok_or_else(|| RuntimeError::Invalid(format!("container {container_id} has no image")))?;

        let image = self
            .docker
            .inspect_image(&image_id)
            .await
            .map_err(|e| api_error(e, &image_id))?;
        Ok(image
            .config
            .and_then(|c| c.labels)
            .unwrap_or_default()
            .into_iter()
            .collect())
    }

    #[instrument(level = "trace", skip(self, request), fields(command = %request.command))]
    async fn exec(&self, container_id: &str, request: &ExecRequest) -> RuntimeResult<ExecOutput> {
        let exec = self
            .docker
            .create_exec(container_id, exec_options(request)?)
            .await
            .map_err(|e| api_error(e, container_id))?;

        let mut output = Vec::new();
        let started = self
            .docker
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await
            .map_err(|e| api_error(e, container_id))?;
        if let StartExecResults::Attached { output: mut stream, .. } = started {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| api_error(e, container_id))?;
                output.extend_from_slice(&chunk.into_bytes());
            }
        }

        let inspected = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| api_error(e, container_id))?;
        let exit_code = inspected
            .exit_code
            .ok_or_else(|| RuntimeError::Invalid(format!("exec {} reported no exit code", exec.id)))?;

        Ok(ExecOutput { exit_code, output })
    }

    fn events(&self, since: DateTime<Utc>) -> BoxStream<'static, RuntimeResult<RuntimeEvent>> {
        let opts = EventsOptions::<String> {
            since: Some(since.timestamp().to_string()),
            until: None,
            filters: event_filters(),
        };
        self.docker
            .events(Some(opts))
            .filter_map(|res| async move {
                match res {
                    Ok(msg) => event_from_message(msg).map(Ok),
                    Err(e) => Some(Err(RuntimeError::Stream(e.to_string()))),
                }
            })
            .boxed()
    }
}
