//! Tree expansion.
//!
//! The expander grows a frontier node into a bounded-depth tree by:
//! 1. Rebuilding the node's full token sequence
//! 2. Running the inference engine on that sequence
//! 3. Ranking the last position's logits
//! 4. Adding one child per ranked prediction, then expanding each child
//!
//! Every expanded node costs one full-sequence inference call, so a full
//! expansion makes `1 + k + k^2 + ... + k^(d-1)` calls for branching factor
//! `k` and depth budget `d`. Callers bound both before expanding.
//!
//! Work is driven by an explicit queue of `(node, depth)` pairs rather than
//! recursion. Depth-first order issues inference calls in the same order as
//! the textbook recursive formulation; [`Traversal::Parallel`] runs each
//! level's calls concurrently and attaches the results in rank order, so the
//! resulting tree has the same shape and content.

use super::ranker::Ranker;
use crate::error::{ArborError, Result};
use crate::model::{run_engine, InferenceEngine};
use crate::tree::{NodeId, Prediction, PredictionTree};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Order in which pending nodes are expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traversal {
    /// Finish each child's subtree before its next sibling.
    #[default]
    DepthFirst,
    /// Finish each level before the next one.
    BreadthFirst,
    /// Level by level, with the calls of one level run on the rayon pool.
    Parallel,
}

/// Configuration for tree expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpanderConfig {
    /// Children per expanded node (0 = the whole vocabulary).
    pub top_k: usize,
    /// Depth budget; nodes at this depth are not expanded.
    pub max_depth: usize,
    /// Queue discipline.
    #[serde(default)]
    pub traversal: Traversal,
    /// Log a warning when the expected number of inference calls exceeds this.
    #[serde(default = "default_warn_call_estimate")]
    pub warn_call_estimate: u64,
}

fn default_warn_call_estimate() -> u64 {
    10_000
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            top_k: 1,
            max_depth: 8,
            traversal: Traversal::DepthFirst,
            warn_call_estimate: default_warn_call_estimate(),
        }
    }
}

/// A node whose expansion failed below the starting node.
#[derive(Debug)]
pub struct ExpansionFailure {
    /// The node left without children.
    pub node: NodeId,
    /// Its depth below the node expansion started from, which is 0.
    pub depth: usize,
    /// What went wrong.
    pub error: ArborError,
}

/// Outcome of a successful [`TreeExpander::expand`].
#[derive(Debug, Default)]
pub struct ExpansionReport {
    /// Number of nodes the expander attempted to run inference for.
    pub inference_calls: usize,
    /// Number of nodes added to the tree.
    pub nodes_added: usize,
    /// Nodes that failed and were left as leaves.
    pub failures: Vec<ExpansionFailure>,
}

impl ExpansionReport {
    /// Whether every attempted node was expanded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Expected inference calls to expand `levels` levels with `branching` children each.
pub fn estimated_calls(branching: usize, levels: usize) -> u64 {
    let mut total: u64 = 0;
    let mut width: u64 = 1;
    for _ in 0..levels {
        total = total.saturating_add(width);
        width = width.saturating_mul(branching as u64);
    }
    total
}

/// Grows a [`PredictionTree`] by querying an [`InferenceEngine`].
pub struct TreeExpander<'a, E: ?Sized> {
    /// Engine producing logits.
    engine: &'a E,
    /// Ranker sized to the engine's vocabulary.
    ranker: Ranker,
    /// Configuration.
    config: ExpanderConfig,
}

impl<'a, E> TreeExpander<'a, E>
where
    E: InferenceEngine + ?Sized,
{
    /// Create an expander over `engine`.
    pub fn new(engine: &'a E, config: ExpanderConfig) -> Self {
        Self {
            engine,
            ranker: Ranker::new(engine.vocab_size()),
            config,
        }
    }

    /// Get configuration.
    pub fn config(&self) -> &ExpanderConfig {
        &self.config
    }

    /// Branching factor actually produced per node.
    pub fn branching(&self) -> usize {
        if self.config.top_k == 0 {
            self.ranker.vocab_size()
        } else {
            self.config.top_k.min(self.ranker.vocab_size())
        }
    }

    /// Ranked next-token predictions for the sequence ending at `node`.
    ///
    /// Reads the tree only; nothing is attached. Failures from the engine,
    /// the logits tensor, or ranking are all reported as
    /// [`ArborError::Inference`].
    pub fn predict(&self, tree: &PredictionTree, node: NodeId) -> Result<Vec<Prediction>> {
        let tokens = tree.path_tokens(node)?;
        if tokens.is_empty() {
            return Err(ArborError::InvalidInput(
                "cannot run inference on an empty sequence".into(),
            ));
        }

        run_engine(self.engine, &tokens)
            .and_then(|logits| logits.last())
            .and_then(|row| self.ranker.rank(&row, self.config.top_k))
            .map_err(ArborError::into_inference)
    }

    /// Expand `node`, treating it as depth 0.
    pub fn expand(&self, tree: &mut PredictionTree, node: NodeId) -> Result<ExpansionReport> {
        self.expand_at(tree, node, 0)
    }

    /// Expand `node`, which sits at `depth` of the depth budget.
    ///
    /// Returns an error only if `node` itself cannot be expanded; failures
    /// further down leave the failed node childless and are listed in the
    /// report.
    pub fn expand_at(
        &self,
        tree: &mut PredictionTree,
        node: NodeId,
        depth: usize,
    ) -> Result<ExpansionReport> {
        if !tree.node(node)?.is_leaf() {
            return Err(ArborError::AlreadyExpanded(node.0));
        }
        if depth >= self.config.max_depth {
            return Ok(ExpansionReport::default());
        }

        let estimate = estimated_calls(self.branching(), self.config.max_depth - depth);
        if estimate > self.config.warn_call_estimate {
            warn!(
                estimate,
                top_k = self.config.top_k,
                max_depth = self.config.max_depth,
                "expansion will issue a large number of inference calls"
            );
        }

        match self.config.traversal {
            Traversal::DepthFirst => self.run_queue(tree, node, depth, true),
            Traversal::BreadthFirst => self.run_queue(tree, node, depth, false),
            Traversal::Parallel => self.run_levels(tree, node, depth),
        }
    }

    /// Sequential expansion; `lifo` selects depth-first order.
    fn run_queue(
        &self,
        tree: &mut PredictionTree,
        start: NodeId,
        depth: usize,
        lifo: bool,
    ) -> Result<ExpansionReport> {
        let mut report = ExpansionReport::default();
        let mut queue = VecDeque::from([(start, depth)]);

        loop {
            let next = if lifo { queue.pop_back() } else { queue.pop_front() };
            let Some((node, node_depth)) = next else {
                break;
            };
            if node_depth >= self.config.max_depth {
                continue;
            }

            let result = self.predict(tree, node);
            let children = self.attach(tree, start, node, node_depth - depth, result, &mut report)?;

            if lifo {
                // Reversed so the rank-0 child is popped first.
                queue.extend(children.into_iter().rev().map(|c| (c, node_depth + 1)));
            } else {
                queue.extend(children.into_iter().map(|c| (c, node_depth + 1)));
            }
        }

        Ok(report)
    }

    /// Level-synchronous expansion with parallel inference per level.
    fn run_levels(
        &self,
        tree: &mut PredictionTree,
        start: NodeId,
        depth: usize,
    ) -> Result<ExpansionReport> {
        let mut report = ExpansionReport::default();
        let mut frontier = vec![start];
        let mut level = depth;

        while !frontier.is_empty() && level < self.config.max_depth {
            let shared: &PredictionTree = tree;
            let results: Vec<Result<Vec<Prediction>>> = frontier
                .par_iter()
                .map(|&node| self.predict(shared, node))
                .collect();

            // Attach sequentially in frontier order: one writer per node.
            let mut next = Vec::new();
            for (&node, result) in frontier.iter().zip(results) {
                next.extend(self.attach(tree, start, node, level - depth, result, &mut report)?);
            }

            frontier = next;
            level += 1;
        }

        Ok(report)
    }

    /// Add ranked children to `node`, or record why it stays a leaf.
    ///
    /// `depth` counts from `start`.
    fn attach(
        &self,
        tree: &mut PredictionTree,
        start: NodeId,
        node: NodeId,
        depth: usize,
        result: Result<Vec<Prediction>>,
        report: &mut ExpansionReport,
    ) -> Result<Vec<NodeId>> {
        report.inference_calls += 1;

        let predictions = match result {
            Ok(predictions) => predictions,
            Err(error) if node == start => return Err(error),
            Err(error) => {
                warn!(node = %node, depth, error = %error, "node expansion failed, leaving it as a leaf");
                report.failures.push(ExpansionFailure { node, depth, error });
                return Ok(Vec::new());
            }
        };

        let mut children = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            children.push(tree.add_child(node, prediction)?);
        }
        report.nodes_added += children.len();

        debug!(node = %node, depth, children = children.len(), "expanded node");
        Ok(children)
    }
}

impl<E: ?Sized> std::fmt::Debug for TreeExpander<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeExpander")
            .field("ranker", &self.ranker)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FnEngine;
    use crate::tree::SeedAnchor;
    use candle_core::Tensor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VOCAB: usize = 32;

    /// Prefers `last + 1`, then `last + 2`, ... (mod VOCAB).
    fn counting_logits(prefix: &[u32]) -> Vec<f32> {
        let last = *prefix.last().unwrap() as usize;
        (0..VOCAB)
            .map(|t| {
                let distance = (t + VOCAB - last - 1) % VOCAB;
                -(distance as f32)
            })
            .collect()
    }

    fn config(top_k: usize, max_depth: usize, traversal: Traversal) -> ExpanderConfig {
        ExpanderConfig {
            top_k,
            max_depth,
            traversal,
            ..Default::default()
        }
    }

    /// Engine that fails on a chosen call number (1-based).
    struct FlakyEngine {
        calls: AtomicUsize,
        fail_on: usize,
    }

    impl InferenceEngine for FlakyEngine {
        fn forward(&self, tokens: &[u32]) -> Result<Tensor> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(ArborError::Inference("engine unavailable".into()));
            }
            FnEngine::new(VOCAB, counting_logits).forward(tokens)
        }

        fn vocab_size(&self) -> usize {
            VOCAB
        }
    }

    /// Engine whose tensors have the wrong vocabulary dimension.
    struct WrongShapeEngine;

    impl InferenceEngine for WrongShapeEngine {
        fn forward(&self, tokens: &[u32]) -> Result<Tensor> {
            FnEngine::new(VOCAB + 1, |_: &[u32]| vec![0.0; VOCAB + 1]).forward(tokens)
        }

        fn vocab_size(&self) -> usize {
            VOCAB
        }
    }

    #[test]
    fn greedy_chain_of_two() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let expander = TreeExpander::new(&engine, config(1, 2, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[10, 20], SeedAnchor::Leaf);

        let report = expander.expand(&mut tree, leaf).unwrap();

        assert_eq!(report.nodes_added, 2);
        assert_eq!(report.inference_calls, 2);
        assert_eq!(tree.len(), 5);
        let first = tree.node(leaf).unwrap().first_child().unwrap();
        let second = tree.node(first).unwrap().first_child().unwrap();
        assert_eq!(tree.path_tokens(second).unwrap(), vec![10, 20, 21, 22]);
        assert!(tree.node(second).unwrap().is_leaf());
    }

    #[test]
    fn zero_depth_is_noop() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let expander = TreeExpander::new(&engine, config(3, 0, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[1, 2], SeedAnchor::Leaf);

        let report = expander.expand(&mut tree, leaf).unwrap();

        assert_eq!(report.inference_calls, 0);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn full_expansion_node_count() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let expander = TreeExpander::new(&engine, config(3, 3, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        let report = expander.expand(&mut tree, leaf).unwrap();

        // 3 + 9 + 27 nodes, 1 + 3 + 9 calls
        assert_eq!(report.nodes_added, 39);
        assert_eq!(report.inference_calls, 13);
        assert_eq!(report.inference_calls as u64, estimated_calls(3, 3));
        assert!(report.is_complete());
    }

    #[test]
    fn children_bounded_by_top_k_and_ranked() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let expander = TreeExpander::new(&engine, config(2, 2, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[5], SeedAnchor::Leaf);
        expander.expand(&mut tree, leaf).unwrap();

        let leaf_depth = tree.node(leaf).unwrap().depth();
        for node in tree.iter().filter(|n| n.depth() > leaf_depth) {
            assert!(node.num_children() <= 2);
            let relative = node.depth() - leaf_depth;
            assert_eq!(node.is_leaf(), relative == 2);

            let confidences: Vec<f32> = node
                .children()
                .iter()
                .map(|&c| tree.node(c).unwrap().state().unwrap().confidence)
                .collect();
            assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn depth_offset_shrinks_budget() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let expander = TreeExpander::new(&engine, config(1, 3, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        let report = expander.expand_at(&mut tree, leaf, 2).unwrap();
        assert_eq!(report.nodes_added, 1);
    }

    #[test]
    fn traversals_build_identical_trees() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let shapes: Vec<Vec<Vec<u32>>> = [Traversal::DepthFirst, Traversal::BreadthFirst, Traversal::Parallel]
            .into_iter()
            .map(|traversal| {
                let expander = TreeExpander::new(&engine, config(2, 3, traversal));
                let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[3], SeedAnchor::Leaf);
                expander.expand(&mut tree, leaf).unwrap();
                tree.leaves(leaf)
                    .unwrap()
                    .into_iter()
                    .map(|l| tree.path_tokens(l).unwrap())
                    .collect()
            })
            .collect();

        assert_eq!(shapes[0], shapes[1]);
        assert_eq!(shapes[0], shapes[2]);
    }

    #[test]
    fn failure_on_second_call_is_contained() {
        let engine = FlakyEngine {
            calls: AtomicUsize::new(0),
            fail_on: 2,
        };
        let expander = TreeExpander::new(&engine, config(2, 2, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        let report = expander.expand(&mut tree, leaf).unwrap();

        let first_level = tree.children(leaf).unwrap().to_vec();
        assert_eq!(first_level.len(), 2);
        // Second call expands the rank-0 child.
        assert!(tree.node(first_level[0]).unwrap().is_leaf());
        assert_eq!(tree.children(first_level[1]).unwrap().len(), 2);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].node, first_level[0]);
        assert_eq!(report.failures[0].depth, 1);
        assert!(report.failures[0].error.is_inference());
    }

    #[test]
    fn failure_at_start_node_is_fatal() {
        let engine = FlakyEngine {
            calls: AtomicUsize::new(0),
            fail_on: 1,
        };
        let expander = TreeExpander::new(&engine, config(2, 2, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        let err = expander.expand(&mut tree, leaf).unwrap_err();
        assert!(err.is_inference());
        assert!(tree.node(leaf).unwrap().is_leaf());
    }

    #[test]
    fn wrong_vocab_dimension_is_inference_error() {
        let expander = TreeExpander::new(&WrongShapeEngine, config(1, 1, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        let err = expander.expand(&mut tree, leaf).unwrap_err();
        assert!(err.is_inference());
    }

    #[test]
    fn parallel_failures_are_contained() {
        let engine = FlakyEngine {
            calls: AtomicUsize::new(0),
            fail_on: 3,
        };
        let expander = TreeExpander::new(&engine, config(2, 2, Traversal::Parallel));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        let report = expander.expand(&mut tree, leaf).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(tree.children(leaf).unwrap().len(), 2);
        assert_eq!(report.nodes_added, 4);
    }

    #[test]
    fn failure_depth_counts_from_start_node() {
        for traversal in [Traversal::DepthFirst, Traversal::Parallel] {
            let engine = FlakyEngine {
                calls: AtomicUsize::new(0),
                fail_on: 2,
            };
            let expander = TreeExpander::new(&engine, config(2, 3, traversal));
            let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

            let report = expander.expand_at(&mut tree, leaf, 1).unwrap();

            assert_eq!(report.failures.len(), 1, "{:?}", traversal);
            assert_eq!(report.failures[0].depth, 1, "{:?}", traversal);
        }
    }

    #[test]
    fn predict_reports_ranking_failures_as_inference() {
        let engine = FnEngine::new(VOCAB, |_: &[u32]| vec![f32::NAN; VOCAB]);
        let expander = TreeExpander::new(&engine, config(1, 1, Traversal::DepthFirst));
        let (tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        let err = expander.predict(&tree, leaf).unwrap_err();
        assert!(err.is_inference());
    }

    #[test]
    fn expanded_node_cannot_be_expanded_again() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let expander = TreeExpander::new(&engine, config(1, 1, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);
        expander.expand(&mut tree, leaf).unwrap();

        let err = expander.expand(&mut tree, leaf).unwrap_err();
        assert!(matches!(err, ArborError::AlreadyExpanded(_)));
    }

    #[test]
    fn expanding_bare_root_is_rejected() {
        let engine = FnEngine::new(VOCAB, counting_logits);
        let expander = TreeExpander::new(&engine, config(1, 1, Traversal::DepthFirst));
        let mut tree = PredictionTree::new();

        let err = expander.expand(&mut tree, NodeId::ROOT).unwrap_err();
        assert!(matches!(err, ArborError::InvalidInput(_)));
    }

    #[test]
    fn estimated_calls_saturates() {
        assert_eq!(estimated_calls(1, 4), 4);
        assert_eq!(estimated_calls(2, 3), 7);
        assert_eq!(estimated_calls(0, 3), 1);
        assert_eq!(estimated_calls(50257, 10), u64::MAX);
    }

    #[test]
    fn top_k_zero_branches_over_vocab() {
        let engine = FnEngine::new(4, |_: &[u32]| vec![0.0, 1.0, 2.0, 3.0]);
        let expander = TreeExpander::new(&engine, config(0, 1, Traversal::DepthFirst));
        let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[0], SeedAnchor::Leaf);

        expander.expand(&mut tree, leaf).unwrap();
        assert_eq!(tree.children(leaf).unwrap().len(), 4);
        assert_eq!(expander.branching(), 4);
    }
}
