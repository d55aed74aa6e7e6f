//! Text continuation example.
//!
//! Drives the high-level generator with a word-level toy tokenizer and a
//! scripted model, then shows per-position predictions for the prompt.

use anyhow::Result;
use arbor::prelude::*;

const WORDS: &[&str] = &["<unk>", "once", "upon", "a", "time", "there", "was", "fox", "."];

/// Splits on whitespace; unknown words map to `<unk>`.
struct WordTokenizer;

impl TextTokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> arbor::Result<Vec<u32>> {
        Ok(text
            .split_whitespace()
            .map(|w| WORDS.iter().position(|&v| v == w).unwrap_or(0) as u32)
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> arbor::Result<String> {
        ids.iter()
            .map(|&id| {
                WORDS
                    .get(id as usize)
                    .map(|w| format!(" {}", w))
                    .ok_or_else(|| ArborError::Tokenization(format!("unknown id {}", id)))
            })
            .collect()
    }

    fn vocab_size(&self) -> usize {
        WORDS.len()
    }
}

/// Each word strongly predicts the one after it in `WORDS`.
fn scripted_logits(prefix: &[u32]) -> Vec<f32> {
    let last = *prefix.last().unwrap_or(&0) as usize;
    let mut logits = vec![0.0f32; WORDS.len()];
    logits[(last + 1) % WORDS.len()] = 5.0;
    logits[(last + 2) % WORDS.len()] = 2.5;
    logits
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let generator = Generator::builder()
        .tokenizer(WordTokenizer)
        .engine(FnEngine::new(WORDS.len(), scripted_logits))
        .top_k(2)
        .word_count(5)
        .build()?;

    let prompt = "once upon";

    for position in generator.inspect(prompt, 3)? {
        println!("Model output ({}):", position.position);
        for prediction in &position.predictions {
            println!("\t{}", generator.describe(prediction)?);
        }
    }

    let result = generator.generate(prompt).execute()?;

    println!();
    println!("Input: {}", prompt);
    println!("Generated {} tokens: {:?}", result.num_generated_tokens, result.tokens);
    println!("Result: {}", result.text);
    println!(
        "Tree holds {} candidate nodes from {} inference calls",
        result.tree.subtree_size(result.root)?,
        result.report.inference_calls
    );

    let exploration = generator.explore(prompt, 3, 2)?;
    println!("Alternatives after \"{}\":", prompt);
    for &child in exploration.tree.children(exploration.root)? {
        if let Some(prediction) = exploration.tree.node(child)?.state() {
            println!("\t{}", generator.describe(prediction)?);
        }
    }

    Ok(())
}
