use thiserror::Error;

use crate::{locks::LockError, runtime::RuntimeError};
use stevedore_model::ModelError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The lock table disagrees with the reconciliation logic.
    ///
    /// This is a bug in the engine, never caused by container labels.
    #[error("service lock invariant violated: {0}")]
    Invariant(#[from] LockError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

pub type CoreResult<T> = Result<T, CoreError>;
