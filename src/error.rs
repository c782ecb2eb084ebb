//! Error types for the plan generation pipeline.

use thiserror::Error;

/// Errors raised by the generation client and its collaborators.
///
/// Only the orchestrator decides what to do with these; lower layers raise
/// them and never degrade on their own.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no generation API credential configured (GOOGLE_API_KEY)")]
    MissingCredential,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("generation endpoint returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("model output could not be parsed into tasks")]
    ParseFailed,

    #[error("configuration error: {0}")]
    Config(String),
}

impl PlanError {
    /// Whether another attempt against the endpoint could succeed.
    ///
    /// Configuration and parse failures are permanent for a given request;
    /// retrying them only burns quota.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlanError::Transport(_)
                | PlanError::HttpStatus { .. }
                | PlanError::MalformedResponse(_)
        )
    }
}
