use std::process::ExitCode;

use thiserror::Error;

use crate::config::ConfigError;
use crate::lockfile::LockFileError;

/// Why the daemon stopped abnormally; each class has its own exit code.
#[derive(Debug, Error)]
pub enum ExitReason {
    /// Invalid settings or an unusable docker endpoint.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("another instance is running: {0}")]
    AnotherInstance(String),

    #[error("unhandled error: {0:#}")]
    Unhandled(#[from] anyhow::Error),
}

impl ExitReason {
    pub fn code(&self) -> u8 {
        match self {
            ExitReason::Config(_) => 1,
            ExitReason::AnotherInstance(_) => 2,
            ExitReason::Unhandled(_) => 3,
        }
    }
}

impl From<ConfigError> for ExitReason {
    fn from(e: ConfigError) -> Self {
        ExitReason::Config(e.to_string())
    }
}

impl From<LockFileError> for ExitReason {
    fn from(e: LockFileError) -> Self {
        match e {
            LockFileError::Held(_) => ExitReason::AnotherInstance(e.to_string()),
            LockFileError::Io { .. } => ExitReason::Config(e.to_string()),
        }
    }
}

impl From<ExitReason> for ExitCode {
    fn from(reason: ExitReason) -> Self {
        ExitCode::from(reason.code())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn exit_code_family() {
        assert_eq!(ExitReason::Config("x".into()).code(), 1);
        assert_eq!(ExitReason::AnotherInstance("x".into()).code(), 2);
        assert_eq!(ExitReason::from(anyhow::anyhow!("boom")).code(), 3);
    }

    #[test]
    fn held_lock_means_another_instance() {
        let held = ExitReason::from(LockFileError::Held(PathBuf::from("/tmp/x.lock")));
        assert_eq!(held.code(), 2);

        let io = ExitReason::from(LockFileError::Io {
            path: PathBuf::from("/x"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert_eq!(io.code(), 1);
    }
}
