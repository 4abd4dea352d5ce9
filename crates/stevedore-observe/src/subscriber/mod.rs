#![cfg(feature = "subscriber")]

//! Job event logging.
//!
//! Renders scheduler events as tracing records: executions at `info` (or `error` for a non-zero
//! exit code) followed by the captured output, failures at `error`, misfires at `warn`, and
//! lifecycle changes at `debug`.

use async_trait::async_trait;
use stevedore_core::events::{JobEvent, JobEventKind, Subscribe};
use tracing::{debug, error, info, warn};

const BEGIN_MARKER: &str = "== BEGIN of captured stdout & stderr ";
const END_MARKER: &str = "== END of captured stdout & stderr ";

/// Sized for bursts of a few thousand events; overflowing events are dropped by the bus.
const JOB_LOGGER_QUEUE_CAPACITY: usize = 2048;

/// Subscriber that logs every job event.
#[derive(Default)]
pub struct JobLogger;

#[async_trait]
impl Subscribe for JobLogger {
    async fn on_event(&self, event: &JobEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "job-logger"
    }

    fn queue_capacity(&self) -> usize {
        JOB_LOGGER_QUEUE_CAPACITY
    }
}

fn log_event(e: &JobEvent) {
    let msg = message_for(&e.kind);
    let job = e.job_name.as_str();
    let container = short_id(&e.container_id);

    match &e.kind {
        JobEventKind::Executed {
            command,
            exit_code,
            output,
            duration,
        } => {
            let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
            if *exit_code == 0 {
                info!(job, container, command = %command, exit_code, duration_ms, "{msg}");
                for line in frame_output(output) {
                    info!(job, container, "{line}");
                }
            } else {
                error!(job, container, command = %command, exit_code, duration_ms, "{msg}");
                for line in frame_output(output) {
                    error!(job, container, "{line}");
                }
            }
        }
        JobEventKind::Errored { error } => error!(job, container, error = %error, "{msg}"),
        JobEventKind::Missed { scheduled } => {
            let late_ms = (e.at - *scheduled).num_milliseconds();
            warn!(job, container, scheduled = %scheduled, late_ms, "{msg}")
        }
        JobEventKind::MaxInstances { max_instances } => {
            info!(job, container, max_instances, "{msg}")
        }
        JobEventKind::SkippedPaused => info!(job, container, "{msg}"),

        JobEventKind::Added { paused, next_run } => match next_run {
            Some(next) => debug!(job, container, job_id = %e.job_id, paused, next_run = %next, "{msg}"),
            None => debug!(job, container, job_id = %e.job_id, paused, "{msg}"),
        },
        JobEventKind::Reassigned { from } => {
            debug!(job, container, job_id = %e.job_id, from = short_id(from), "{msg}")
        }
        JobEventKind::Removed | JobEventKind::Paused | JobEventKind::Resumed => {
            debug!(job, container, job_id = %e.job_id, "{msg}")
        }
    }
}

#[inline]
fn message_for(kind: &JobEventKind) -> &'static str {
    match kind {
        JobEventKind::Added { .. } => "job added",
        JobEventKind::Removed => "job removed",
        JobEventKind::Paused => "job paused",
        JobEventKind::Resumed => "job resumed",
        JobEventKind::Reassigned { .. } => "job handed over to another container",
        JobEventKind::Executed { .. } => "command finished",
        JobEventKind::Errored { .. } => "job execution failed",
        JobEventKind::Missed { .. } => "missed execution",
        JobEventKind::MaxInstances { .. } => "not running, maximum instances are still running",
        JobEventKind::SkippedPaused => "not running, container is paused",
    }
}

/// Container ids are logged in their 12 character short form.
fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Captured output between begin and end markers, both padded with `=` to the longest line.
///
/// Empty output yields no lines at all.
fn frame_output(output: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let width = longest.max(BEGIN_MARKER.len() + 2);
    let marker = |head: &str| format!("{head}{}", "=".repeat(width - head.len()));

    let mut framed = Vec::with_capacity(lines.len() + 2);
    framed.push(marker(BEGIN_MARKER));
    framed.extend(lines.into_iter().map(str::to_string));
    framed.push(marker(END_MARKER));
    framed
}
