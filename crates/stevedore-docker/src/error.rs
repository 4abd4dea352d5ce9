use thiserror::Error;

/// Errors raised while setting up the docker connection.
///
/// Failures of individual API calls are reported as [`stevedore_core::runtime::RuntimeError`].
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("unsupported docker host: {0} (expected unix://, tcp:// or http://)")]
    InvalidHost(String),

    #[error("docker socket does not exist: {0}")]
    SocketMissing(String),

    #[error("failed to connect to docker: {0}")]
    Connect(#[from] bollard::errors::Error),
}

pub type DockerResult<T> = Result<T, DockerError>;
