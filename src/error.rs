//! Error taxonomy for ingest and query operations.
//!
//! Every failure path surfaces one of these kinds so the transport layer can
//! answer with a distinct code instead of a generic message.

use lexrag_core::error::ConfigError;
use thiserror::Error;

use crate::extract::ExtractError;
use crate::generator::GenerateError;

#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunk geometry, top-k, temperature, or question.
    #[error("invalid request: {0}")]
    Configuration(#[from] ConfigError),

    #[error("file is {size} bytes, exceeding the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// The store holds no chunks at all.
    #[error("no documents have been ingested")]
    RetrievalEmpty,

    /// The generator produced nothing usable within the retry budget.
    #[error("generation failed after {attempts} attempt(s): {source}")]
    GenerationFailure {
        attempts: u32,
        #[source]
        source: GenerateError,
    },
}

impl RagError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "bad_request",
            RagError::FileTooLarge { .. } => "payload_too_large",
            RagError::Extraction(ExtractError::UnsupportedFormat(_)) => "unsupported_format",
            RagError::Extraction(ExtractError::CorruptFile { .. }) => "corrupt_file",
            RagError::RetrievalEmpty => "retrieval_empty",
            RagError::GenerationFailure { .. } => "generation_failure",
        }
    }
}
