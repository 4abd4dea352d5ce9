//! Docker Engine adapter for the stevedore runtime boundary.
//!
//! [`DockerRuntime`] implements [`stevedore_core::runtime::ContainerRuntime`] on top of
//! `bollard`. Connection settings come from [`DockerConfig`], usually built from `DOCKER_HOST`
//! and `CLIENT_TIMEOUT`.
mod config;
pub use config::{DEFAULT_DOCKER_HOST, DockerConfig, DockerHost};

mod convert;

mod error;
pub use error::{DockerError, DockerResult};

mod runtime;
pub use runtime::DockerRuntime;
