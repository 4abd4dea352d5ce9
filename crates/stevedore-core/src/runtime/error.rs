use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The container (or its image) does not exist anymore.
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("runtime api error: {0}")]
    Api(String),

    #[error("event stream error: {0}")]
    Stream(String),

    #[error("invalid runtime response: {0}")]
    Invalid(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
