//! Error types for compliance verification

use thiserror::Error;

use crate::service::llm::LlmError;

/// Error type for compliance verification
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerificationError {
    #[error("No supplier documents were provided for verification")]
    NoDocuments,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(
        "The API did not return the expected tool call; the model may have failed to process the request"
    )]
    MissingToolCall,

    #[error("The API returned invalid JSON for verification: {0}")]
    InvalidPayload(String),

    #[error("Failed to prepare verification request: {0}")]
    Internal(String),
}
