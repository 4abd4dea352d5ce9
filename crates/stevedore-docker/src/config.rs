use std::{fmt, path::Path, str::FromStr, time::Duration};

use crate::error::DockerError;

pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Docker endpoint as given in `DOCKER_HOST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerHost {
    /// Path of a unix domain socket.
    Unix(String),
    /// `host:port` reached over plain HTTP.
    Tcp(String),
}

impl DockerHost {
    /// Fail early if a unix socket does not exist.
    pub fn check(&self) -> Result<(), DockerError> {
        match self {
            DockerHost::Unix(path) if !Path::new(path).exists() => {
                Err(DockerError::SocketMissing(path.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for DockerHost {
    fn default() -> Self {
        DockerHost::Unix("/var/run/docker.sock".to_string())
    }
}

impl FromStr for DockerHost {
    type Err = DockerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DockerError::InvalidHost(s.to_string()));
            }
            return Ok(DockerHost::Unix(path.to_string()));
        }
        let addr = s
            .strip_prefix("tcp://")
            .or_else(|| s.strip_prefix("http://"))
            .ok_or_else(|| DockerError::InvalidHost(s.to_string()))?;
        match addr.trim_end_matches('/') {
            "" => Err(DockerError::InvalidHost(s.to_string())),
            addr => Ok(DockerHost::Tcp(addr.to_string())),
        }
    }
}

impl fmt::Display for DockerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerHost::Unix(path) => write!(f, "unix://{path}"),
            DockerHost::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Connection settings of [`crate::DockerRuntime`].
#[derive(Debug, Clone)]
pub struct DockerConfig {
    pub host: DockerHost,
    /// Timeout of every API request, including command execution.
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: DockerHost::default(),
            timeout: Duration::from_secs(120),
        }
    }
}
