pub mod engine;
pub mod error;
pub mod events;
pub mod labels;
pub mod locks;
pub mod metrics;
pub mod runtime;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use error::{CoreError, CoreResult};
pub use metrics::{JobOutcome, MetricsBackend, MetricsHandle, NoOpMetrics, SkipReason, noop_metrics};

pub mod prelude {
    pub use crate::engine::Engine;
    pub use crate::error::CoreError;
    pub use crate::events::{EventBus, JobEvent, JobEventKind, Subscribe};
    pub use crate::labels::{LabelParser, ParsedLabels, ParserConfig};
    pub use crate::locks::{LockError, ServiceLocks};
    pub use crate::runtime::{ContainerRuntime, RuntimeError, RuntimeEvent};
    pub use crate::scheduler::{ScheduledJob, Scheduler, SchedulerConfig};
}
