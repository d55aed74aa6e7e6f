//! Decoding an expanded tree into a token sequence.
//!
//! Greedy decoding follows the rank-0 child from the expansion root down.
//! With `top_k = 1` that is plain greedy generation; with wider trees the
//! alternative branches stay in the tree for inspection but are not part of
//! the output.
//!
//! Best-path decoding instead scores complete paths by their summed log
//! probability and returns the best one among the deepest leaves.

use crate::error::Result;
use crate::tree::{NodeId, PredictionTree};
use serde::{Deserialize, Serialize};

/// How an expanded tree is turned into output tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// Follow the highest-ranked child at every step.
    #[default]
    Greedy,
    /// Highest summed log probability among the deepest leaves.
    BestPath,
}

/// A decoded continuation with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPath {
    /// Tokens below the expansion root, in order.
    pub tokens: Vec<u32>,
    /// Summed log probability of the full path below the expansion root.
    pub log_prob: f64,
    /// Last node of the path.
    pub leaf: NodeId,
}

/// Follow rank-0 children below `from`, emitting at most `word_count` tokens.
///
/// Stops at the first childless node; a node whose expansion failed is just
/// such a leaf.
pub fn decode_greedy(tree: &PredictionTree, from: NodeId, word_count: usize) -> Result<Vec<u32>> {
    let mut tokens = Vec::new();
    let mut current = tree.node(from)?.first_child();

    while let Some(id) = current {
        if tokens.len() >= word_count {
            break;
        }
        let node = tree.node(id)?;
        tokens.extend(node.token());
        current = node.first_child();
    }

    Ok(tokens)
}

/// Best-scoring path from `from` to one of the deepest leaves below it.
///
/// Ties keep the leaf that comes first in rank order. The path is cut to
/// `word_count` tokens after selection; `log_prob` scores the whole path.
pub fn decode_best_path(tree: &PredictionTree, from: NodeId, word_count: usize) -> Result<DecodedPath> {
    let leaves = tree.leaves(from)?;
    let deepest = leaves
        .iter()
        .filter_map(|&id| tree.get(id).map(|n| n.depth()))
        .max()
        .unwrap_or(0);

    let mut best: Option<(NodeId, f64)> = None;
    for &leaf in &leaves {
        if tree.node(leaf)?.depth() != deepest {
            continue;
        }
        let score = tree.path_log_prob(from, leaf)?;
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((leaf, score));
        }
    }

    let (leaf, log_prob) = best.unwrap_or((from, 0.0));
    let skip = tree.node(from)?.depth();
    let tokens = tree
        .path_tokens(leaf)?
        .into_iter()
        .skip(skip)
        .take(word_count)
        .collect();

    Ok(DecodedPath {
        tokens,
        log_prob,
        leaf,
    })
}

/// Decode with the given strategy.
pub fn decode(
    tree: &PredictionTree,
    from: NodeId,
    word_count: usize,
    strategy: DecodeStrategy,
) -> Result<Vec<u32>> {
    match strategy {
        DecodeStrategy::Greedy => decode_greedy(tree, from, word_count),
        DecodeStrategy::BestPath => Ok(decode_best_path(tree, from, word_count)?.tokens),
    }
}
