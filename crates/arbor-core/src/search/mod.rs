//! Prediction-tree search.
//!
//! This module turns model logits into a tree of candidate continuations
//! and reads generated text back out of it:
//! - **Ranking** of one position's logits into top-k predictions
//! - **Expansion** of a frontier node to a bounded depth
//! - **Decoding** of the expanded tree (greedy or best path)
//!
//! # Architecture
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Ranker`] | Softmax + deterministic top-k over a vocabulary slice |
//! | [`TreeExpander`] | Grows the tree by calling the inference engine per node |
//! | [`decode_greedy`] | Follows rank-0 children from the expansion root |
//! | [`decode_best_path`] | Picks the deepest path with the best summed log probability |
//!
//! # Example
//!
//! ```
//! use arbor_core::model::FnEngine;
//! use arbor_core::search::{decode_greedy, ExpanderConfig, TreeExpander};
//! use arbor_core::tree::{PredictionTree, SeedAnchor};
//!
//! // Toy model over 8 tokens that always prefers `last + 1`
//! let engine = FnEngine::new(8, |prefix: &[u32]| {
//!     let next = (*prefix.last().unwrap() as usize + 1) % 8;
//!     (0..8).map(|t| if t == next { 5.0 } else { 0.0 }).collect()
//! });
//!
//! let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[1, 2], SeedAnchor::Leaf);
//! let expander = TreeExpander::new(&engine, ExpanderConfig {
//!     top_k: 1,
//!     max_depth: 3,
//!     ..Default::default()
//! });
//! expander.expand(&mut tree, leaf).unwrap();
//!
//! assert_eq!(decode_greedy(&tree, leaf, 3).unwrap(), vec![3, 4, 5]);
//! ```
//!
//! # Cost
//!
//! Expansion is exhaustive: every node below the depth budget triggers one
//! inference call over its whole prefix, so calls grow as `top_k^max_depth`.
//! See [`estimated_calls`].

mod decoder;
mod expander;
mod ranker;

pub use decoder::{decode, decode_best_path, decode_greedy, DecodeStrategy, DecodedPath};
pub use expander::{
    estimated_calls, ExpanderConfig, ExpansionFailure, ExpansionReport, Traversal, TreeExpander,
};
pub use ranker::{softmax, Ranker};
