use thiserror::Error;
use validator::ValidationErrors;

/// Errors that can occur in service layer operations.
///
/// Every variant is handled at the boundary of the inbound handler that
/// triggered it and rendered as an outbound `Error` event; none of them
/// crashes a connection task.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Requested room or player is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The question generator gave up after its bounded retries.
    #[error("question generation failed: {0}")]
    Generation(String),
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}
