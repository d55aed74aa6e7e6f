//! Arena-backed prediction tree.

use super::node::{NodeId, Prediction, TreeNode};
use crate::error::{ArborError, Result};

/// Which node [`PredictionTree::seed_from_tokens`] hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedAnchor {
    /// The synthetic root.
    Root,
    /// The node holding the last prompt token.
    #[default]
    Leaf,
}

/// Search tree over candidate token continuations.
///
/// Nodes live in a flat arena and refer to each other by [`NodeId`], so the
/// parent back-reference never participates in ownership. A node's children
/// list only grows; nothing is ever removed from the arena.
#[derive(Debug, Clone)]
pub struct PredictionTree {
    /// All nodes, indexed by `NodeId`.
    nodes: Vec<TreeNode>,
}

impl PredictionTree {
    /// Create a tree holding only the synthetic root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::root()],
        }
    }

    /// Build a root plus one linear chain of known tokens.
    ///
    /// Every prompt token gets confidence 1.0: the tree has no alternatives
    /// for tokens that are already known.
    pub fn seed_from_tokens(tokens: &[u32], anchor: SeedAnchor) -> (Self, NodeId) {
        let mut tree = Self::new();
        let mut current = NodeId::ROOT;
        for &token in tokens {
            current = tree.push_node(current, Prediction::certain(token));
        }

        let handle = match anchor {
            SeedAnchor::Root => NodeId::ROOT,
            SeedAnchor::Leaf => current,
        };
        (tree, handle)
    }

    /// Root node ID.
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Append a child to `parent`, after any existing children.
    pub fn add_child(&mut self, parent: NodeId, prediction: Prediction) -> Result<NodeId> {
        self.node(parent)?;
        Ok(self.push_node(parent, prediction))
    }

    /// Caller guarantees `parent` exists.
    fn push_node(&mut self, parent: NodeId, prediction: Prediction) -> NodeId {
        let id = NodeId(self.nodes.len());
        let child = TreeNode::child(id, &self.nodes[parent.0], prediction);
        self.nodes.push(child);
        self.nodes[parent.0].push_child(id);
        id
    }

    /// Get a node.
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    /// Get a node, failing on unknown handles.
    pub fn node(&self, id: NodeId) -> Result<&TreeNode> {
        self.get(id).ok_or(ArborError::InvalidNode(id.0))
    }

    /// Children of a node in rank order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    /// Token ids from the root down to `id`, prompt first.
    ///
    /// The root contributes nothing, so this is empty only for the root.
    pub fn path_tokens(&self, id: NodeId) -> Result<Vec<u32>> {
        let mut tokens = Vec::with_capacity(self.node(id)?.depth());
        let mut current = Some(id);

        while let Some(node) = current.and_then(|c| self.get(c)) {
            if let Some(token) = node.token() {
                tokens.push(token);
            }
            current = node.parent();
        }

        tokens.reverse();
        Ok(tokens)
    }

    /// Summed log probability of the path from `ancestor` (exclusive) to `id`.
    pub fn path_log_prob(&self, ancestor: NodeId, id: NodeId) -> Result<f64> {
        let mut total = 0.0;
        let mut current = self.node(id)?;

        while current.id() != ancestor {
            if let Some(prediction) = current.state() {
                total += prediction.log_prob();
            }
            current = match current.parent() {
                Some(parent) => self.node(parent)?,
                None => {
                    return Err(ArborError::InvalidInput(format!(
                        "{} is not an ancestor of {}",
                        ancestor, id
                    )))
                }
            };
        }

        Ok(total)
    }

    /// Leaves below `from` in depth-first rank order.
    ///
    /// A childless `from` is its own only leaf.
    pub fn leaves(&self, from: NodeId) -> Result<Vec<NodeId>> {
        self.node(from)?;
        let mut leaves = Vec::new();
        let mut stack = vec![from];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.is_leaf() {
                leaves.push(id);
            } else {
                stack.extend(node.children().iter().rev());
            }
        }

        Ok(leaves)
    }

    /// Number of nodes below `from`, excluding `from` itself.
    pub fn subtree_size(&self, from: NodeId) -> Result<usize> {
        let mut count = 0;
        let mut stack = self.children(from)?.to_vec();

        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend_from_slice(self.nodes[id.0].children());
        }

        Ok(count)
    }

    /// Total node count, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing besides the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Iterate over all nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }
}

impl Default for PredictionTree {
    fn default() -> Self {
        Self::new()
    }
}
