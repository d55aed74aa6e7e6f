//! # Arbor Core
//!
//! Prediction-tree search engine for autoregressive text continuation.
//!
//! This crate provides:
//! - **Ranking** of per-position logits into softmax top-k predictions
//! - **Prediction trees** stored as an arena with parent back-references
//! - **Tree expansion** driven by an injected inference engine
//! - **Decoding** of expanded trees (greedy rank-0 walk or best path)
//! - **Collaborator seams** for the inference engine and the tokenizer

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod model;
pub mod search;
pub mod tree;

pub use error::{ArborError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ArborError, Result};
    pub use crate::model::{InferenceEngine, ModelConfig, TextTokenizer};
    pub use crate::search::{DecodeStrategy, ExpanderConfig, Ranker, Traversal, TreeExpander};
    pub use crate::tree::{NodeId, Prediction, PredictionTree, SeedAnchor};
}
