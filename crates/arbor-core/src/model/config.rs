//! Model configuration.

use serde::{Deserialize, Serialize};

/// GPT-2 vocabulary size.
pub const GPT2_VOCAB_SIZE: usize = 50257;

/// Properties of the language model the search runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Vocabulary size, shared by tokenizer and engine.
    pub vocab_size: usize,
    /// Longest prompt, in tokens, accepted for a request.
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,
    /// Model name, for logs.
    #[serde(default)]
    pub name: String,
}

fn default_max_prompt_tokens() -> usize {
    128
}

impl ModelConfig {
    /// Config for a vocabulary of `vocab_size` tokens, other fields default.
    pub fn with_vocab_size(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            ..Self::default()
        }
    }

    /// Load from JSON file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the search cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.vocab_size == 0 {
            return Err(crate::ArborError::Config("vocab_size must be positive".into()));
        }
        if self.max_prompt_tokens == 0 {
            return Err(crate::ArborError::Config(
                "max_prompt_tokens must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        // GPT-2 with a 128-token prompt window
        Self {
            vocab_size: GPT2_VOCAB_SIZE,
            max_prompt_tokens: default_max_prompt_tokens(),
            name: "gpt2".to_string(),
        }
    }
}
