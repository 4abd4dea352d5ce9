//! Container labels to job definitions.
//!
//! Labels under the configured namespace look like `<ns>.<job>.<attribute>` or
//! `<ns>.<job>.env.<VAR>`, plus the container-wide `<ns>.options.flags` and
//! `<ns>.options.user`. The parser groups them per job, applies flags and user fallbacks, and
//! validates every job on its own: a broken job is logged and dropped, its siblings survive.
mod cache;
use cache::LabelCache;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error, warn};

use stevedore_model::{
    DEFAULT_NAMESPACE, DEFAULT_SERVICE_ID_LABELS, ENV_SEGMENT, Flags, IdentityLookup,
    JobDefinition, JobValidator, Labels, OPTIONS_DEPRECATED_KEY, OPTIONS_FLAGS_KEY,
    OPTIONS_USER_KEY, RawJob, ServiceIdentity, ValidatorConfig,
};

use crate::error::CoreResult;
use crate::runtime::{ContainerInfo, ContainerRuntime};

/// Label parser settings.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Label namespace, without the trailing dot.
    pub namespace: String,
    /// Ordered identity label keys.
    pub service_id_labels: Vec<String>,
    /// Flags applied before a container's own `options.flags`.
    pub default_flags: Flags,
    /// User for jobs without `user` when no `options.user` label is set.
    pub default_user: String,
    /// Number of parse results kept per container id.
    pub cache_capacity: usize,
    pub validator: ValidatorConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            service_id_labels: DEFAULT_SERVICE_ID_LABELS.iter().map(|s| s.to_string()).collect(),
            default_flags: Flags::resolve(&Flags::default(), "image,service"),
            default_user: "root".to_string(),
            cache_capacity: 128,
            validator: ValidatorConfig::default(),
        }
    }
}

/// Result of parsing one container's labels.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedLabels {
    /// `None` if no identity labels are set or only some of them.
    pub identity: Option<ServiceIdentity>,
    pub flags: Flags,
    /// Valid jobs keyed by name; empty means there is nothing to schedule.
    pub jobs: BTreeMap<String, JobDefinition>,
}

impl ParsedLabels {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Container-wide options extracted from namespaced labels.
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    flags: Option<String>,
    user: Option<String>,
}

pub struct LabelParser {
    cfg: ParserConfig,
    prefix: String,
    validator: JobValidator,
    runtime: Arc<dyn ContainerRuntime>,
    cache: Mutex<LabelCache>,
}

impl LabelParser {
    pub fn new(cfg: ParserConfig, runtime: Arc<dyn ContainerRuntime>) -> CoreResult<Self> {
        let validator = JobValidator::new(cfg.validator.clone())?;
        let prefix = format!("{}.", cfg.namespace.trim_end_matches('.'));
        let cache = Mutex::new(LabelCache::new(cfg.cache_capacity));
        Ok(Self {
            cfg,
            prefix,
            validator,
            runtime,
            cache,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.cfg
    }

    /// Parse the labels of a container, reusing an earlier result for the same container id.
    ///
    /// Image labels are only fetched when the resolved flags contain `image`.
    pub async fn parse(&self, container: &ContainerInfo) -> CoreResult<Arc<ParsedLabels>> {
        if let Some(hit) = self.cache().get(&container.id) {
            return Ok(hit);
        }

        let mut own = self.namespaced(&container.labels);
        let options = self.take_options(&container.id, &mut own);
        let flags = Flags::resolve(&self.cfg.default_flags, options.flags.as_deref().unwrap_or(""));

        let mut image_user = None;
        let merged = if flags.image() {
            let mut image = self.namespaced(&self.runtime.image_labels(&container.id).await?);
            let image_options = self.take_options(&container.id, &mut image);
            image_user = image_options.user;
            own.layered_over(&image)
        } else {
            own
        };

        let user = options
            .user
            .or(image_user)
            .unwrap_or_else(|| self.cfg.default_user.clone());
        let identity = self.identity(container);

        let parsed = Arc::new(ParsedLabels {
            jobs: self.definitions(&container.id, &merged, &user, identity.as_ref()),
            identity,
            flags,
        });
        debug!(
            container = %container.id,
            jobs = parsed.jobs.len(),
            flags = %parsed.flags,
            "parsed container labels"
        );
        self.cache().insert(&container.id, Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Forget the cached result for a container.
    pub fn invalidate(&self, container_id: &str) {
        self.cache().remove(container_id);
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self, container_id: &str) -> bool {
        self.cache().get(container_id).is_some()
    }

    fn cache(&self) -> MutexGuard<'_, LabelCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Labels under the namespace, with the namespace stripped from their keys.
    fn namespaced(&self, labels: &Labels) -> Labels {
        labels
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(self.prefix.as_str()).map(|k| (k, v)))
            .collect()
    }

    fn take_options(&self, container_id: &str, labels: &mut Labels) -> Options {
        let deprecated = labels.remove(OPTIONS_DEPRECATED_KEY);
        if deprecated.is_some() {
            warn!(
                container = container_id,
                "the '{}{}' label is deprecated, use '{}{}' instead",
                self.prefix,
                OPTIONS_DEPRECATED_KEY,
                self.prefix,
                OPTIONS_FLAGS_KEY
            );
        }
        Options {
            flags: labels.remove(OPTIONS_FLAGS_KEY).or(deprecated),
            user: labels.remove(OPTIONS_USER_KEY),
        }
    }

    fn identity(&self, container: &ContainerInfo) -> Option<ServiceIdentity> {
        match ServiceIdentity::lookup(&container.labels, &self.cfg.service_id_labels) {
            IdentityLookup::Complete(identity) => Some(identity),
            IdentityLookup::Absent => None,
            IdentityLookup::Partial { missing } => {
                error!(
                    container = %container.id,
                    missing = %missing.join(","),
                    "container carries only some service identity labels, treating it as a standalone container"
                );
                None
            }
        }
    }

    /// Group namespaced labels per job and validate each group.
    fn definitions(
        &self,
        container_id: &str,
        labels: &Labels,
        user: &str,
        identity: Option<&ServiceIdentity>,
    ) -> BTreeMap<String, JobDefinition> {
        let mut out = BTreeMap::new();
        for raw in group_jobs(container_id, labels).values_mut() {
            raw.set_default("user", user);
            match self.validator.validate(raw) {
                Ok(mut definition) => {
                    definition.service_identity = identity.cloned();
                    out.insert(definition.name.clone(), definition);
                }
                Err(e) => error!(container = container_id, job = %raw.name, "{e}"),
            }
        }
        out
    }
}

/// Split `<job>.<attribute>` and `<job>.env.<VAR>` keys into raw jobs.
fn group_jobs(container_id: &str, labels: &Labels) -> BTreeMap<String, RawJob> {
    let mut jobs: BTreeMap<String, RawJob> = BTreeMap::new();
    for (key, value) in labels.iter() {
        if let Some((name, var)) = key.split_once(ENV_SEGMENT) {
            jobs.entry(name.to_string())
                .or_insert_with(|| RawJob::new(name))
                .environment
                .insert(var, value);
        } else if let Some((name, attribute)) = key.split_once('.') {
            jobs.entry(name.to_string())
                .or_insert_with(|| RawJob::new(name))
                .set(attribute, value);
        } else {
            debug!(container = container_id, label = key, "ignoring label without job attribute");
        }
    }
    jobs
}
