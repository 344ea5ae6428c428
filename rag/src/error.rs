//! Error taxonomy shared by every stage of a chat turn.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The index, embedding or model service could not be reached.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Condense, retrieval or generation failed for the current turn.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("message cannot be empty")]
    EmptyMessage,
}

impl RagError {
    pub fn service_unavailable(err: impl std::fmt::Display) -> Self {
        RagError::ServiceUnavailable(err.to_string())
    }

    pub fn generation_failed(err: impl std::fmt::Display) -> Self {
        RagError::GenerationFailed(err.to_string())
    }

    /// Re-labels a failure raised while a turn was being produced.
    pub fn into_generation_failure(self) -> Self {
        match self {
            RagError::GenerationFailed(_) | RagError::EmptyMessage => self,
            RagError::ServiceUnavailable(msg) | RagError::Configuration(msg) => {
                RagError::GenerationFailed(msg)
            }
        }
    }
}
