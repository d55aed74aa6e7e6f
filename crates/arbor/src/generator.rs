//! High-level text generator.

use anyhow::{bail, Context, Result};
use arbor_core::{
    model::{run_engine, InferenceEngine, ModelConfig, TextTokenizer},
    search::{decode, DecodeStrategy, ExpanderConfig, ExpansionReport, Ranker, Traversal, TreeExpander},
    tree::{NodeId, Prediction, PredictionTree, SeedAnchor},
    ArborError,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for text generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Children per expanded node (1 = greedy, 0 = whole vocabulary).
    pub top_k: usize,
    /// Tokens to generate; also the expansion depth budget.
    pub word_count: usize,
    /// Expansion order.
    pub traversal: Traversal,
    /// How the expanded tree becomes output tokens.
    pub decode: DecodeStrategy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            top_k: 1,
            word_count: 8,
            traversal: Traversal::DepthFirst,
            decode: DecodeStrategy::Greedy,
        }
    }
}

impl GeneratorConfig {
    /// Load from JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading generator config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing generator config {}", path.display()))
    }

    /// Expander settings for one request.
    pub fn expander_config(&self) -> ExpanderConfig {
        ExpanderConfig {
            top_k: self.top_k,
            max_depth: self.word_count,
            traversal: self.traversal,
            ..Default::default()
        }
    }
}

/// Builder for creating a Generator.
pub struct GeneratorBuilder {
    config: GeneratorConfig,
    model_config: Option<ModelConfig>,
    tokenizer: Option<Arc<dyn TextTokenizer>>,
    engine: Option<Arc<dyn InferenceEngine>>,
}

impl GeneratorBuilder {
    /// Create a new generator builder.
    pub fn new() -> Self {
        Self {
            config: GeneratorConfig::default(),
            model_config: None,
            tokenizer: None,
            engine: None,
        }
    }

    /// Set the tokenizer.
    pub fn tokenizer(mut self, tokenizer: impl TextTokenizer + 'static) -> Self {
        self.tokenizer = Some(Arc::new(tokenizer));
        self
    }

    /// Set a tokenizer shared with other owners.
    pub fn shared_tokenizer(mut self, tokenizer: Arc<dyn TextTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Set the inference engine.
    pub fn engine(mut self, engine: impl InferenceEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Set an inference engine shared with other owners.
    pub fn shared_engine(mut self, engine: Arc<dyn InferenceEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the whole generation config.
    pub fn config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set model configuration directly.
    pub fn model_config(mut self, config: ModelConfig) -> Self {
        self.model_config = Some(config);
        self
    }

    /// Set branching factor.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    /// Set number of tokens to generate.
    pub fn word_count(mut self, word_count: usize) -> Self {
        self.config.word_count = word_count;
        self
    }

    /// Set expansion order.
    pub fn traversal(mut self, traversal: Traversal) -> Self {
        self.config.traversal = traversal;
        self
    }

    /// Set decode strategy.
    pub fn decode_strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.config.decode = strategy;
        self
    }

    /// Build the generator.
    pub fn build(self) -> Result<Generator> {
        let tokenizer = self.tokenizer.context("generator needs a tokenizer")?;
        let engine = self.engine.context("generator needs an inference engine")?;

        let model_config = self
            .model_config
            .unwrap_or_else(|| ModelConfig::with_vocab_size(engine.vocab_size()));
        model_config.validate()?;

        if model_config.vocab_size != engine.vocab_size() {
            bail!(ArborError::Config(format!(
                "model vocab_size {} does not match engine vocab_size {}",
                model_config.vocab_size,
                engine.vocab_size()
            )));
        }
        if tokenizer.vocab_size() != engine.vocab_size() {
            warn!(
                tokenizer = tokenizer.vocab_size(),
                engine = engine.vocab_size(),
                "tokenizer and engine disagree on vocabulary size"
            );
        }

        info!(model = %model_config.name, vocab_size = model_config.vocab_size, "generator ready");

        Ok(Generator {
            config: self.config,
            model_config,
            tokenizer,
            engine,
        })
    }
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Text generator over an injected tokenizer and inference engine.
///
/// The collaborators are acquired once and released when the generator is
/// dropped. Each request builds its own prediction tree.
pub struct Generator {
    config: GeneratorConfig,
    model_config: ModelConfig,
    tokenizer: Arc<dyn TextTokenizer>,
    engine: Arc<dyn InferenceEngine>,
}

impl Generator {
    /// Create a new generator builder.
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::new()
    }

    /// Get generation configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Get model configuration.
    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    /// Tokenize a prompt, enforcing the prompt window.
    pub fn encode_prompt(&self, prompt: &str) -> Result<Vec<u32>> {
        let tokens = self.tokenizer.encode(prompt).context("tokenizing prompt")?;

        if tokens.is_empty() {
            bail!(ArborError::InvalidInput("prompt produced no tokens".into()));
        }
        if tokens.len() > self.model_config.max_prompt_tokens {
            bail!(ArborError::InvalidInput(format!(
                "prompt has {} tokens, limit is {}",
                tokens.len(),
                self.model_config.max_prompt_tokens
            )));
        }

        Ok(tokens)
    }

    /// Start a generation request from a prompt.
    pub fn generate(&self, prompt: &str) -> GenerateRequest<'_> {
        GenerateRequest {
            generator: self,
            prompt: prompt.to_string(),
            config: self.config.clone(),
        }
    }

    /// Expand a prediction tree below `prompt` without decoding it.
    ///
    /// The tree branches `top_k` ways per node (0 = whole vocabulary) for
    /// `depth` levels. As with [`GenerateRequest::execute`], only a failure
    /// of the first inference call is an error.
    pub fn explore(&self, prompt: &str, top_k: usize, depth: usize) -> Result<Exploration> {
        let tokens = self.encode_prompt(prompt)?;

        let (mut tree, root) = PredictionTree::seed_from_tokens(&tokens, SeedAnchor::Leaf);
        let config = ExpanderConfig {
            top_k,
            max_depth: depth,
            traversal: self.config.traversal,
            ..Default::default()
        };
        let report = TreeExpander::new(self.engine.as_ref(), config)
            .expand(&mut tree, root)
            .context("expanding prediction tree")?;

        debug!(
            nodes = report.nodes_added,
            inference_calls = report.inference_calls,
            "explored prediction tree"
        );

        Ok(Exploration { tree, root, report })
    }

    /// Top `top_k` predictions (0 = whole vocabulary) for the token
    /// following each prompt position.
    pub fn inspect(&self, prompt: &str, top_k: usize) -> Result<Vec<PositionPredictions>> {
        let tokens = self.encode_prompt(prompt)?;
        let logits = run_engine(self.engine.as_ref(), &tokens).context("running inference")?;
        let ranked = Ranker::new(self.engine.vocab_size())
            .rank_positions(&logits, top_k)
            .context("ranking logits")?;

        Ok(tokens
            .into_iter()
            .zip(ranked)
            .enumerate()
            .map(|(position, (token, predictions))| PositionPredictions {
                position,
                token,
                predictions,
            })
            .collect())
    }

    /// Render a prediction as `"<token> (<text>) => <confidence>"`.
    pub fn describe(&self, prediction: &Prediction) -> Result<String> {
        let text = self
            .tokenizer
            .decode(&[prediction.token])
            .context("decoding prediction")?;
        Ok(format!(
            "{} ({}) => {}",
            prediction.token, text, prediction.confidence
        ))
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        debug!(model = %self.model_config.name, "releasing generator collaborators");
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.config)
            .field("model_config", &self.model_config)
            .finish()
    }
}

/// A generation request.
pub struct GenerateRequest<'a> {
    generator: &'a Generator,
    prompt: String,
    config: GeneratorConfig,
}

impl<'a> GenerateRequest<'a> {
    /// Set number of tokens to generate.
    pub fn word_count(mut self, n: usize) -> Self {
        self.config.word_count = n;
        self
    }

    /// Set branching factor.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set expansion order.
    pub fn traversal(mut self, traversal: Traversal) -> Self {
        self.config.traversal = traversal;
        self
    }

    /// Set decode strategy.
    pub fn decode_strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.config.decode = strategy;
        self
    }

    /// Execute the generation.
    ///
    /// A failure of the first inference call fails the request. Later
    /// failures only cut the continuation short; they are listed in
    /// [`GenerateResult::report`].
    pub fn execute(self) -> Result<GenerateResult> {
        let generator = self.generator;
        let tokens = generator.encode_prompt(&self.prompt)?;

        let (mut tree, root) = PredictionTree::seed_from_tokens(&tokens, SeedAnchor::Leaf);
        let expander = TreeExpander::new(generator.engine.as_ref(), self.config.expander_config());
        let report = expander
            .expand(&mut tree, root)
            .context("expanding prediction tree")?;

        let generated = decode(&tree, root, self.config.word_count, self.config.decode)?;
        let continuation = generator
            .tokenizer
            .decode(&generated)
            .context("decoding continuation")?;

        info!(
            prompt_tokens = tokens.len(),
            generated_tokens = generated.len(),
            inference_calls = report.inference_calls,
            failures = report.failures.len(),
            "generation finished"
        );

        Ok(GenerateResult {
            text: format!("{}{}", self.prompt, continuation),
            continuation,
            num_prompt_tokens: tokens.len(),
            num_generated_tokens: generated.len(),
            tokens: generated,
            tree,
            root,
            report,
        })
    }
}

/// Result of text generation.
#[derive(Debug)]
pub struct GenerateResult {
    /// Prompt followed by the generated continuation.
    pub text: String,
    /// Generated text alone.
    pub continuation: String,
    /// Generated token IDs.
    pub tokens: Vec<u32>,
    /// Number of prompt tokens.
    pub num_prompt_tokens: usize,
    /// Number of generated tokens.
    pub num_generated_tokens: usize,
    /// The expanded tree, for inspection.
    pub tree: PredictionTree,
    /// Node holding the last prompt token; the expansion root.
    pub root: NodeId,
    /// Expansion statistics and fail-soft failures.
    pub report: ExpansionReport,
}

/// An expanded, undecoded prediction tree.
#[derive(Debug)]
pub struct Exploration {
    /// The expanded tree.
    pub tree: PredictionTree,
    /// Node holding the last prompt token; the expansion root.
    pub root: NodeId,
    /// Expansion statistics and fail-soft failures.
    pub report: ExpansionReport,
}

/// Ranked predictions for the token after one prompt position.
#[derive(Debug, Clone)]
pub struct PositionPredictions {
    /// Position in the prompt.
    pub position: usize,
    /// Prompt token at that position.
    pub token: u32,
    /// Predictions for the next token, best first.
    pub predictions: Vec<Prediction>,
}
