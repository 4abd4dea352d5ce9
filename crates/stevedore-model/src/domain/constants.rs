//! Well-known label keys and flag names.
//!
//! Namespaced keys are given without the namespace prefix; the label parser joins them with the
//! configured namespace at runtime.

/// Label namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "stevedore";

/// Flag that merges job definitions from the container's image labels.
pub const FLAG_IMAGE: &str = "image";

/// Flag that restricts a service's jobs to a single container.
pub const FLAG_SERVICE: &str = "service";

/// `<ns>.options.flags`
pub const OPTIONS_FLAGS_KEY: &str = "options.flags";

/// `<ns>.options.user`
pub const OPTIONS_USER_KEY: &str = "options.user";

/// `<ns>.options`, deprecated alias of [`OPTIONS_FLAGS_KEY`].
pub const OPTIONS_DEPRECATED_KEY: &str = "options";

/// Marker inside a job key that assigns an environment variable: `<job>.env.<VAR>`.
pub const ENV_SEGMENT: &str = ".env.";

/// Identity labels set by docker compose, in their configured order.
pub const DEFAULT_SERVICE_ID_LABELS: [&str; 2] =
    ["com.docker.compose.project", "com.docker.compose.service"];

/// Image labels that carry the image title, newest convention first.
pub const IMAGE_TITLE_LABELS: [&str; 2] = ["org.opencontainers.image.title", "org.label-schema.name"];
