//! Model collaborators.
//!
//! Provides the seams between the search engine and the model:
//! - Model configuration
//! - Inference engine trait and logits validation
//! - Tokenizer trait and HuggingFace adapter

mod config;
mod engine;
mod tokenizer;

pub use config::{ModelConfig, GPT2_VOCAB_SIZE};
pub use engine::{run_engine, FnEngine, InferenceEngine, Logits};
pub use tokenizer::{TextTokenizer, Tokenizer};
