use std::sync::Arc;

/// Job execution outcome for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Command exited with code 0.
    Success,
    /// Command exited with a non-zero code.
    Failure,
    /// Command could not be executed.
    Error,
}

impl JobOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failure => "failure",
            JobOutcome::Error => "error",
        }
    }

    pub fn from_exit_code(code: i64) -> Self {
        if code == 0 { Self::Success } else { Self::Failure }
    }
}

/// Reason a due firing did not run its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Container was paused at fire time.
    Paused,
    /// Max instances of the job were still running.
    MaxInstances,
    /// Firing started later than the misfire grace time.
    Missed,
    /// Container was no longer running; the job was removed.
    Stale,
}

impl SkipReason {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            SkipReason::Paused => "paused",
            SkipReason::MaxInstances => "max_instances",
            SkipReason::Missed => "missed",
            SkipReason::Stale => "stale",
        }
    }
}

/// Backend metrics collection interface.
///
/// All label values are bounded: `trigger` is one of `cron`, `date` or `interval`.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record that a job's command was handed to the runtime.
    fn record_job_started(&self, trigger: &str);
    /// Record job completion with outcome and duration.
    ///
    /// # Arguments
    /// - `trigger`: Trigger kind of the job
    /// - `outcome`: How the execution ended
    /// - `duration_ms`: Execution time in milliseconds
    fn record_job_completed(&self, trigger: &str, outcome: JobOutcome, duration_ms: u64);
    /// Record a due firing that was skipped.
    fn record_job_skipped(&self, trigger: &str, reason: SkipReason);
    /// Record a failed call to the container runtime.
    ///
    /// `operation` is the runtime call, e.g. `events` or `inspect`.
    fn record_runtime_error(&self, operation: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
