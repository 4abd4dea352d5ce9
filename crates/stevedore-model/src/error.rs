use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown trigger kind: {0}")]
    UnknownTriggerKind(String),

    #[error("unknown container status: {0}")]
    UnknownStatus(String),

    #[error("unknown timezone: {0}")]
    UnknownTimeZone(String),

    #[error("cannot coerce {kind} value '{value}'")]
    Coercion { kind: &'static str, value: String },

    /// A trigger could not be instantiated from its normalized arguments.
    ///
    /// `detail` carries the low-level cause and is only shown to operators in debug mode.
    #[error("error while instantiating a {kind} trigger with '{args}'")]
    Trigger {
        kind: &'static str,
        args: String,
        detail: String,
    },

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Single rule violation for one attribute of a job definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All errors collected while validating one job definition.
///
/// A job with a validation error is dropped from its batch; sibling jobs are unaffected.
#[derive(Debug, Clone, Error)]
#[error("misconfigured job definition '{job}': {}", join(.errors))]
pub struct ValidationError {
    pub job: String,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Returns `true` if any error is attached to the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_field() {
        let err = ValidationError {
            job: "backup".into(),
            errors: vec![
                FieldError::new("command", "required field"),
                FieldError::new("max", "must be a positive integer"),
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("'backup'"));
        assert!(msg.contains("command: required field"));
        assert!(msg.contains("max: must be a positive integer"));
        assert!(err.has_field("max"));
        assert!(!err.has_field("user"));
    }
}
