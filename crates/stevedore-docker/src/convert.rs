//! Mapping between Docker Engine API models and runtime boundary types.
use std::collections::HashMap;

use bollard::errors::Error as BollardError;
use bollard::exec::CreateExecOptions;
use bollard::models::{ContainerInspectResponse, ContainerStateStatusEnum, EventMessage};
use chrono::{DateTime, TimeZone, Utc};

use stevedore_core::runtime::{
    ContainerAction, ContainerFilter, ContainerInfo, ExecRequest, RuntimeError, RuntimeEvent,
};
use stevedore_model::{ContainerStatus, Labels};

pub(crate) fn status_from_state(state: &ContainerStateStatusEnum) -> Option<ContainerStatus> {
    match state {
        ContainerStateStatusEnum::CREATED => Some(ContainerStatus::Created),
        ContainerStateStatusEnum::RUNNING => Some(ContainerStatus::Running),
        ContainerStateStatusEnum::PAUSED => Some(ContainerStatus::Paused),
        ContainerStateStatusEnum::RESTARTING => Some(ContainerStatus::Restarting),
        ContainerStateStatusEnum::REMOVING => Some(ContainerStatus::Removing),
        ContainerStateStatusEnum::EXITED => Some(ContainerStatus::Exited),
        ContainerStateStatusEnum::DEAD => Some(ContainerStatus::Dead),
        ContainerStateStatusEnum::EMPTY => None,
    }
}

/// `StartedAt` of a container; the zero time of never started containers maps to `None`.
pub(crate) fn parse_started_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .filter(|t| t.timestamp() > 0)
}

pub(crate) fn container_from_inspect(resp: ContainerInspectResponse) -> Result<ContainerInfo, RuntimeError> {
    let id = resp
        .id
        .ok_or_else(|| RuntimeError::Invalid("container without id".into()))?;
    let state = resp.state.unwrap_or_default();
    let status = state
        .status
        .as_ref()
        .and_then(status_from_state)
        .ok_or_else(|| RuntimeError::Invalid(format!("container {id} has no known state")))?;
    let config = resp.config.unwrap_or_default();

    Ok(ContainerInfo {
        name: resp
            .name
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        image: config.image.or(resp.image).unwrap_or_default(),
        status,
        labels: config.labels.unwrap_or_default().into_iter().collect(),
        started_at: state.started_at.as_deref().and_then(parse_started_at),
        id,
    })
}

/// Lifecycle event of a container; other event types and actions yield `None`.
pub(crate) fn event_from_message(msg: EventMessage) -> Option<RuntimeEvent> {
    let action = ContainerAction::from_action(msg.action.as_deref()?)?;
    let actor = msg.actor?;
    let container_id = actor.id?;

    let time = match (msg.time_nano, msg.time) {
        (Some(nanos), _) => Utc.timestamp_nanos(nanos),
        (None, Some(secs)) => Utc.timestamp_opt(secs, 0).single()?,
        (None, None) => Utc::now(),
    };

    Some(RuntimeEvent {
        action,
        container_id,
        attributes: actor.attributes.unwrap_or_default().into_iter().collect::<Labels>(),
        time,
    })
}

/// Server-side filters for the containers list endpoint.
pub(crate) fn list_filters(filter: &ContainerFilter) -> HashMap<String, Vec<String>> {
    let mut filters = HashMap::new();
    if !filter.statuses.is_empty() {
        filters.insert(
            "status".to_string(),
            filter.statuses.iter().map(|s| s.as_str().to_string()).collect(),
        );
    }
    if !filter.labels.is_empty() {
        filters.insert("label".to_string(), filter.labels.clone());
    }
    filters
}

pub(crate) fn event_filters() -> HashMap<String, Vec<String>> {
    HashMap::from([
        ("type".to_string(), vec!["container".to_string()]),
        (
            "event".to_string(),
            ContainerAction::ALL.iter().map(|a| a.as_str().to_string()).collect(),
        ),
    ])
}

/// Exec creation options; the command is split with POSIX shell word rules.
pub(crate) fn exec_options(req: &ExecRequest) -> Result<CreateExecOptions<String>, RuntimeError> {
    let cmd = shlex::split(&req.command)
        .filter(|words| !words.is_empty())
        .ok_or_else(|| RuntimeError::Invalid(format!("cannot split command: {}", req.command)))?;

    Ok(CreateExecOptions {
        cmd: Some(cmd),
        user: Some(req.user.clone()).filter(|u| !u.is_empty()),
        env: Some(req.environment.to_exec_vars()).filter(|e| !e.is_empty()),
        working_dir: req.workdir.clone(),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        ..Default::default()
    })
}

/// Classify an API error; a 404 means the object is gone.
pub(crate) fn api_error(err: BollardError, id: &str) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError { status_code: 404, .. } => {
            RuntimeError::NotFound(id.to_string())
        }
        other => RuntimeError::Api(other.to_string()),
    }
}
