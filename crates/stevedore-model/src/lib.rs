mod domain;
pub use domain::{
    ContainerStatus, Env, Flags, IdentityLookup, Labels, ServiceIdentity, DEFAULT_NAMESPACE,
    DEFAULT_SERVICE_ID_LABELS, ENV_SEGMENT, FLAG_IMAGE, FLAG_SERVICE, IMAGE_TITLE_LABELS,
    OPTIONS_DEPRECATED_KEY, OPTIONS_FLAGS_KEY, OPTIONS_USER_KEY,
};

mod error;
pub use error::{FieldError, ModelError, ModelResult, ValidationError};

pub mod timeexpr;
pub use timeexpr::{decompose, parse_duration};

mod trigger;
pub use trigger::{CronFields, IntervalFields, Trigger, TriggerKind, TriggerSpec};

mod job;
pub use job::{JobDefinition, JobId, JobValidator, RawJob, ValidatorConfig};
