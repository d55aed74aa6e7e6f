//! Logits ranking.
//!
//! Turns one position's raw logits into a descending list of
//! [`Prediction`]s:
//! 1. Softmax over the vocabulary
//! 2. Pair each token id with its probability
//! 3. Order by probability (descending), ties by token id (ascending)
//! 4. Keep the first `top_k`

use crate::error::{ArborError, Result};
use crate::model::Logits;
use crate::tree::Prediction;
use std::cmp::Ordering;

/// Normalize logits into a probability distribution.
///
/// The maximum is subtracted before exponentiating, so large logits do not
/// overflow. NaN or `+inf` entries, or a slice with no finite entry, are
/// rejected with [`ArborError::InvalidInput`]; `-inf` entries get
/// probability zero.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    if let Some(bad) = logits.iter().find(|l| l.is_nan() || **l == f32::INFINITY) {
        return Err(ArborError::InvalidInput(format!("logit {} is not usable", bad)));
    }

    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !max_logit.is_finite() {
        return Err(ArborError::InvalidInput("no finite logits".into()));
    }

    let exp_logits: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum_exp: f32 = exp_logits.iter().sum();
    Ok(exp_logits.iter().map(|&e| e / sum_exp).collect())
}

/// Descending confidence, then ascending token id.
fn rank_order(a: &Prediction, b: &Prediction) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.token.cmp(&b.token))
}

/// Ranks vocabulary slices into top-k predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranker {
    /// Vocabulary size every slice must match.
    vocab_size: usize,
}

impl Ranker {
    /// Create a ranker for a vocabulary of `vocab_size` tokens.
    pub fn new(vocab_size: usize) -> Self {
        Self { vocab_size }
    }

    /// Vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Rank one position's logits.
    ///
    /// # Arguments
    ///
    /// * `logits` - Raw scores, exactly `vocab_size` long
    /// * `top_k` - Number of predictions to keep; 0 keeps the whole vocabulary
    ///
    /// # Returns
    ///
    /// `min(top_k, vocab_size)` predictions (or `vocab_size` when `top_k` is
    /// 0), highest confidence first. Identical input gives identical output.
    pub fn rank(&self, logits: &[f32], top_k: usize) -> Result<Vec<Prediction>> {
        if logits.len() != self.vocab_size {
            return Err(ArborError::InvalidInput(format!(
                "expected vocab_size {}, got {}",
                self.vocab_size,
                logits.len()
            )));
        }

        let probs = softmax(logits)?;
        let mut ranked: Vec<Prediction> = probs
            .iter()
            .enumerate()
            .map(|(i, &p)| Prediction::new(i as u32, p))
            .collect();

        let keep = if top_k == 0 {
            ranked.len()
        } else {
            top_k.min(ranked.len())
        };

        // Partition first so only the kept prefix is sorted.
        if keep < ranked.len() {
            ranked.select_nth_unstable_by(keep, rank_order);
            ranked.truncate(keep);
        }
        ranked.sort_by(rank_order);

        Ok(ranked)
    }

    /// Rank every position of a logits tensor.
    ///
    /// Entry `i` holds the predictions for the token following position `i`.
    pub fn rank_positions(&self, logits: &Logits, top_k: usize) -> Result<Vec<Vec<Prediction>>> {
        (0..logits.seq_len())
            .map(|position| self.rank(&logits.position(position)?, top_k))
            .collect()
    }
}
