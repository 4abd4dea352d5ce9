//! Validated job definitions and their identifiers.
mod id;
pub use id::JobId;

mod validator;
pub use validator::{JobValidator, ValidatorConfig};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Env, ServiceIdentity, Trigger};

/// Attributes of one job as grouped from labels, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawJob {
    /// Job name taken from the label key.
    pub name: String,
    /// `<job>.<attribute>` values, keyed by attribute.
    pub attributes: BTreeMap<String, String>,
    /// `<job>.env.<VAR>` values.
    pub environment: Env,
}

impl RawJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set an attribute; returns `self` for chaining.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(attribute.into(), value.into());
        self
    }

    /// Set an attribute only if it is not present yet.
    pub fn set_default(&mut self, attribute: &str, value: &str) -> &mut Self {
        self.attributes
            .entry(attribute.to_string())
            .or_insert_with(|| value.to_string());
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(|s| s.as_str())
    }
}

/// Normalized, validated description of one recurring command.
///
/// Only produced by [`JobValidator::validate`]; raw label maps never travel past the parser.
#[derive(Debug, Clone, Serialize)]
pub struct JobDefinition {
    /// Job name, unique per container.
    pub name: String,
    /// Command line run inside the container.
    pub command: String,
    /// Schedule of the job, bound to [`JobDefinition::timezone`].
    pub trigger: Trigger,
    /// User the command runs as; empty means the container's default user.
    pub user: String,
    /// Working directory of the command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Additional environment variables of the command.
    pub environment: Env,
    /// Upper bound of a random delay in seconds, for cron and interval triggers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<u64>,
    /// Maximum number of concurrently running instances.
    pub max_instances: u32,
    /// Timezone name the trigger is evaluated in.
    pub timezone: String,
    /// Identity of the service the owning container belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_identity: Option<ServiceIdentity>,
}
