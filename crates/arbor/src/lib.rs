//! # Arbor
//!
//! Text continuation by prediction-tree search over a language model.
//!
//! Arbor tokenizes a prompt, repeatedly asks an inference engine for
//! next-token logits, and grows a tree of ranked candidate continuations:
//! - **Greedy decode**: `top_k = 1` expands a single chain
//! - **Branching search**: `top_k > 1` keeps ranked alternatives for inspection
//! - **Best path**: optional decode by summed log probability
//! - **Per-position inspection**: top predictions after every prompt token
//! - **Exploration**: the expanded tree itself, without decoding
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use arbor::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let generator = Generator::builder()
//!         .tokenizer(Tokenizer::from_dir("models/gpt2")?)
//!         .engine(my_engine)
//!         .word_count(16)
//!         .build()?;
//!
//!     let result = generator.generate("Once upon a time").execute()?;
//!
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export core crate
pub use arbor_core::*;

mod generator;

pub use generator::{
    Exploration, GenerateRequest, GenerateResult, Generator, GeneratorBuilder, GeneratorConfig,
    PositionPredictions,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::generator::{
        Exploration, GenerateRequest, GenerateResult, Generator, GeneratorBuilder,
        GeneratorConfig, PositionPredictions,
    };
    pub use crate::{
        error::{ArborError, Result},
        model::{FnEngine, InferenceEngine, ModelConfig, TextTokenizer, Tokenizer},
        search::{DecodeStrategy, ExpansionReport, Traversal},
        tree::{NodeId, Prediction, PredictionTree},
    };

    // Re-export useful external types
    pub use anyhow;
    pub use tracing;
}
