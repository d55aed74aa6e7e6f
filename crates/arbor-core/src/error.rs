//! Error types for Arbor Core.

use thiserror::Error;

/// Result type alias for Arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;

/// Errors that can occur while ranking, expanding or decoding.
#[derive(Error, Debug)]
pub enum ArborError {
    /// Malformed input, e.g. a logits slice that does not match the vocabulary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The inference engine failed or returned a malformed tensor.
    #[error("inference error: {0}")]
    Inference(String),

    /// Propagated from the tokenizer without inspection.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Invalid tree node reference.
    #[error("invalid node id: {0}")]
    InvalidNode(usize),

    /// The node already has children and cannot be expanded again.
    #[error("node {0} is already expanded")]
    AlreadyExpanded(usize),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    TensorError(#[from] candle_core::Error),
}

impl ArborError {
    /// Re-tag a collaborator failure as an inference error.
    ///
    /// Errors that already are [`ArborError::Inference`] pass through unchanged.
    pub fn into_inference(self) -> Self {
        match self {
            err @ ArborError::Inference(_) => err,
            other => ArborError::Inference(other.to_string()),
        }
    }

    /// Whether this error came from the inference engine.
    pub fn is_inference(&self) -> bool {
        matches!(self, ArborError::Inference(_))
    }
}
