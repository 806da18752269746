//! Configuration errors raised before any state is touched.

use thiserror::Error;

/// An out-of-range tuning value supplied by the caller.
///
/// These are always recoverable: the caller can retry with corrected input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },

    #[error("top_k must be > 0")]
    ZeroTopK,

    #[error("top_k ({top_k}) exceeds the maximum of {max}")]
    TopKTooLarge { top_k: usize, max: usize },

    #[error("temperature ({0}) must be in [0.0, 1.0]")]
    TemperatureOutOfRange(f64),

    #[error("question must not be empty")]
    EmptyQuestion,
}
