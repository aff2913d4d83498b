use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Blank or malformed ids supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The underlying runtime rejected a command.
    #[error("engine operation `{operation}` failed for {target}: {message}")]
    EngineOperation {
        operation: &'static str,
        target: String,
        message: String,
    },
}

impl FlowError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        FlowError::NotFound { kind, id: id.into() }
    }

    pub fn engine(operation: &'static str, target: impl Into<String>, message: impl Display) -> Self {
        FlowError::EngineOperation {
            operation,
            target: target.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

/// Rejects blank ids with `InvalidArgument`.
pub fn require_id<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(FlowError::InvalidArgument(format!("{} must not be blank", name)));
    }
    Ok(value)
}
