//! Tree node representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a node inside a [`PredictionTree`](super::PredictionTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Root node ID.
    pub const ROOT: NodeId = NodeId(0);

    /// Arena index of this node.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Check if this is the synthetic root.
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A ranked next-token candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Token ID in the model vocabulary.
    pub token: u32,
    /// Probability of the token, in `[0, 1]`.
    pub confidence: f32,
}

impl Prediction {
    /// Create a prediction.
    pub fn new(token: u32, confidence: f32) -> Self {
        Self { token, confidence }
    }

    /// A token known in advance (prompt tokens), with confidence 1.0.
    pub fn certain(token: u32) -> Self {
        Self::new(token, 1.0)
    }

    /// Natural log of the confidence.
    pub fn log_prob(&self) -> f64 {
        (self.confidence as f64).ln()
    }
}

/// One token placed at one position of one candidate continuation.
///
/// Nodes never own their parent; the back-reference is a plain handle used
/// only for path reconstruction.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Arena handle.
    id: NodeId,
    /// Parent node (None for root).
    parent: Option<NodeId>,
    /// Token and confidence (None for root).
    state: Option<Prediction>,
    /// Children in rank order.
    children: Vec<NodeId>,
    /// Distance from the root.
    depth: usize,
}

impl TreeNode {
    /// Create the synthetic root node.
    pub(crate) fn root() -> Self {
        Self {
            id: NodeId::ROOT,
            parent: None,
            state: None,
            children: Vec::new(),
            depth: 0,
        }
    }

    /// Create a child of `parent`.
    pub(crate) fn child(id: NodeId, parent: &TreeNode, prediction: Prediction) -> Self {
        Self {
            id,
            parent: Some(parent.id),
            state: Some(prediction),
            children: Vec::new(),
            depth: parent.depth + 1,
        }
    }

    /// Get node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get parent node ID.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Get the prediction held by this node.
    pub fn state(&self) -> Option<&Prediction> {
        self.state.as_ref()
    }

    /// Token at this node, if any.
    pub fn token(&self) -> Option<u32> {
        self.state.map(|p| p.token)
    }

    /// Children in rank order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Highest-ranked child.
    pub fn first_child(&self) -> Option<NodeId> {
        self.children.first().copied()
    }

    /// Get number of children.
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Whether the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Distance from the root (the root is 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_no_state() {
        let root = TreeNode::root();
        assert!(root.id().is_root());
        assert!(root.parent().is_none());
        assert!(root.state().is_none());
        assert!(root.is_leaf());
    }

    #[test]
    fn child_links_to_parent() {
        let root = TreeNode::root();
        let child = TreeNode::child(NodeId(1), &root, Prediction::new(7, 0.5));

        assert_eq!(child.parent(), Some(NodeId::ROOT));
        assert_eq!(child.token(), Some(7));
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn certain_prediction_has_zero_log_prob() {
        assert_eq!(Prediction::certain(3).log_prob(), 0.0);
    }
}
