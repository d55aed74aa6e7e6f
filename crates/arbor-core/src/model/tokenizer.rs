//! Tokenizer seam and HuggingFace tokenizer adapter.
//!
//! The search engine only sees token ids. [`TextTokenizer`] is the contract
//! the facade uses to turn prompts into ids and ids back into text;
//! [`Tokenizer`] implements it on top of the HuggingFace tokenizers library.

use crate::error::{ArborError, Result};
use std::path::Path;
use tokenizers::Tokenizer as HfTokenizer;

/// Text <-> token id conversion.
///
/// Must be deterministic and share its vocabulary with the inference engine.
pub trait TextTokenizer: Send + Sync {
    /// Encode text to token IDs.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode token IDs to text.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Vocabulary size.
    fn vocab_size(&self) -> usize;
}

/// Tokenizer loaded from a `tokenizer.json` file.
#[derive(Clone)]
pub struct Tokenizer {
    /// Underlying HuggingFace tokenizer.
    inner: HfTokenizer,
}

impl Tokenizer {
    /// Load a tokenizer from a tokenizer.json file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = HfTokenizer::from_file(path.as_ref()).map_err(|e| {
            ArborError::Tokenization(format!(
                "failed to load tokenizer from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Ok(Self { inner })
    }

    /// Load a tokenizer from a model directory.
    ///
    /// Looks for tokenizer.json in the directory.
    pub fn from_dir<P: AsRef<Path>>(model_dir: P) -> Result<Self> {
        let tokenizer_path = model_dir.as_ref().join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(ArborError::Tokenization(format!(
                "tokenizer.json not found in {}",
                model_dir.as_ref().display()
            )));
        }
        Self::from_file(tokenizer_path)
    }
}

impl TextTokenizer for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ArborError::Tokenization(format!("failed to encode text: {}", e)))?;

        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| ArborError::Tokenization(format!("failed to decode tokens: {}", e)))
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("vocab_size", &self.vocab_size())
            .finish()
    }
}
