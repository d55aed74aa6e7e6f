//! Inference engine seam.
//!
//! The core never runs a model itself. It hands a token sequence to an
//! [`InferenceEngine`] and reads back a `[1, seq_len, vocab_size]` logits
//! tensor through [`Logits`], which validates the shape once.

use crate::error::{ArborError, Result};
use candle_core::{DType, Device, IndexOp, Tensor};

/// A forward pass over a token sequence.
///
/// Implementations are stateless from the core's point of view: each call
/// receives the full sequence and no session is carried between calls.
/// Malformed input must be rejected with an error, never truncated.
pub trait InferenceEngine: Send + Sync {
    /// Run the model over `tokens`.
    ///
    /// # Returns
    ///
    /// Unnormalized scores shaped `[1, tokens.len(), vocab_size]`.
    fn forward(&self, tokens: &[u32]) -> Result<Tensor>;

    /// Vocabulary size shared with the tokenizer.
    fn vocab_size(&self) -> usize;
}

/// A logits tensor whose shape has been checked against its request.
#[derive(Debug, Clone)]
pub struct Logits {
    tensor: Tensor,
    seq_len: usize,
    vocab_size: usize,
}

impl Logits {
    /// Wrap an engine output for a sequence of `seq_len` tokens.
    ///
    /// Fails with [`ArborError::Inference`] if the tensor is not
    /// `[1, seq_len, vocab_size]`.
    pub fn new(tensor: Tensor, seq_len: usize, vocab_size: usize) -> Result<Self> {
        let (batch, len, vocab) = tensor
            .dims3()
            .map_err(|e| ArborError::Inference(format!("expected a rank-3 logits tensor: {}", e)))?;

        if batch != 1 || len != seq_len || vocab != vocab_size {
            return Err(ArborError::Inference(format!(
                "expected logits shape [1, {}, {}], got [{}, {}, {}]",
                seq_len, vocab_size, batch, len, vocab
            )));
        }

        Ok(Self {
            tensor,
            seq_len,
            vocab_size,
        })
    }

    /// Number of sequence positions.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Vocabulary slice for one position.
    pub fn position(&self, position: usize) -> Result<Vec<f32>> {
        if position >= self.seq_len {
            return Err(ArborError::InvalidInput(format!(
                "position {} out of range for {} positions",
                position, self.seq_len
            )));
        }

        let row = self.tensor.i((0, position))?.to_dtype(DType::F32)?;
        Ok(row.to_vec1::<f32>()?)
    }

    /// Next-token scores given the whole sequence.
    pub fn last(&self) -> Result<Vec<f32>> {
        match self.seq_len.checked_sub(1) {
            Some(last) => self.position(last),
            None => Err(ArborError::InvalidInput("logits have no positions".into())),
        }
    }
}

/// Run `engine` on `tokens` and validate the result.
///
/// Engine failures and shape mismatches surface as
/// [`ArborError::Inference`]. Reading rows from the returned [`Logits`]
/// reports its own errors; callers that need a uniform inference error map
/// them with [`ArborError::into_inference`].
pub fn run_engine<E>(engine: &E, tokens: &[u32]) -> Result<Logits>
where
    E: InferenceEngine + ?Sized,
{
    let tensor = engine.forward(tokens).map_err(ArborError::into_inference)?;
    Logits::new(tensor, tokens.len(), engine.vocab_size())
}

/// Inference engine backed by a closure that scores one prefix at a time.
///
/// The closure receives `tokens[..=i]` for every position `i` and returns
/// the next-token logits for it. Useful for testing and demos where a real
/// model is not available.
pub struct FnEngine<F> {
    vocab_size: usize,
    score: F,
}

impl<F> FnEngine<F>
where
    F: Fn(&[u32]) -> Vec<f32> + Send + Sync,
{
    /// Create an engine over a vocabulary of `vocab_size` tokens.
    pub fn new(vocab_size: usize, score: F) -> Self {
        Self { vocab_size, score }
    }
}

impl<F> InferenceEngine for FnEngine<F>
where
    F: Fn(&[u32]) -> Vec<f32> + Send + Sync,
{
    fn forward(&self, tokens: &[u32]) -> Result<Tensor> {
        if tokens.is_empty() {
            return Err(ArborError::Inference("empty input sequence".into()));
        }
        if let Some(bad) = tokens.iter().find(|&&t| t as usize >= self.vocab_size) {
            return Err(ArborError::Inference(format!(
                "token {} outside vocabulary of {}",
                bad, self.vocab_size
            )));
        }

        let mut data = Vec::with_capacity(tokens.len() * self.vocab_size);
        for end in 1..=tokens.len() {
            let row = (self.score)(&tokens[..end]);
            if row.len() != self.vocab_size {
                return Err(ArborError::Inference(format!(
                    "scorer returned {} logits, expected {}",
                    row.len(),
                    self.vocab_size
                )));
            }
            data.extend(row);
        }

        Ok(Tensor::from_vec(
            data,
            (1, tokens.len(), self.vocab_size),
            &Device::Cpu,
        )?)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

impl<F> std::fmt::Debug for FnEngine<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEngine")
            .field("vocab_size", &self.vocab_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_token_engine() -> FnEngine<impl Fn(&[u32]) -> Vec<f32> + Send + Sync> {
        FnEngine::new(4, |prefix: &[u32]| {
            let mut row = vec![0.0; 4];
            row[*prefix.last().unwrap() as usize] = 1.0;
            row
        })
    }

    #[test]
    fn fn_engine_produces_one_row_per_position() {
        let engine = last_token_engine();
        let logits = run_engine(&engine, &[0, 2, 3]).unwrap();

        assert_eq!(logits.seq_len(), 3);
        assert_eq!(logits.position(0).unwrap(), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(logits.last().unwrap(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn fn_engine_rejects_empty_input() {
        let engine = last_token_engine();
        let err = run_engine(&engine, &[]).unwrap_err();
        assert!(err.is_inference());
    }

    #[test]
    fn fn_engine_rejects_out_of_vocab_tokens() {
        let engine = last_token_engine();
        assert!(run_engine(&engine, &[9]).unwrap_err().is_inference());
    }

    #[test]
    fn logits_reject_wrong_vocab() {
        let tensor = Tensor::zeros((1, 2, 5), DType::F32, &Device::Cpu).unwrap();
        let err = Logits::new(tensor, 2, 4).unwrap_err();
        assert!(err.is_inference());
    }

    #[test]
    fn logits_reject_wrong_rank() {
        let tensor = Tensor::zeros((2, 5), DType::F32, &Device::Cpu).unwrap();
        assert!(Logits::new(tensor, 2, 5).unwrap_err().is_inference());
    }

    #[test]
    fn logits_position_out_of_range() {
        let tensor = Tensor::zeros((1, 2, 3), DType::F32, &Device::Cpu).unwrap();
        let logits = Logits::new(tensor, 2, 3).unwrap();
        assert!(matches!(logits.position(2), Err(ArborError::InvalidInput(_))));
    }
}
