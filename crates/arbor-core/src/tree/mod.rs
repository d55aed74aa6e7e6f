//! Prediction tree for branching continuation search.
//!
//! This module provides:
//! - [`Prediction`]: a ranked (token, confidence) pair
//! - [`TreeNode`]: one token at one position of one candidate continuation
//! - [`PredictionTree`]: the arena holding a root and all its descendants
//!
//! # Overview
//!
//! A tree is built per generation request. The prompt becomes a single
//! linear chain of certain tokens hanging off a synthetic root, and the
//! expander grows ranked alternatives below the last prompt token.
//!
//! Nodes refer to their parent and children through [`NodeId`] handles into
//! the arena, so there is no cyclic ownership and any node's full token
//! sequence can be rebuilt by walking parents.
//!
//! # Example
//!
//! ```rust
//! use arbor_core::tree::{Prediction, PredictionTree, SeedAnchor};
//!
//! // Seed the tree with prompt tokens
//! let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[464, 3290], SeedAnchor::Leaf);
//!
//! // Branch below the prompt
//! let best = tree.add_child(leaf, Prediction::new(318, 0.7)).unwrap();
//! let other = tree.add_child(leaf, Prediction::new(373, 0.2)).unwrap();
//!
//! assert_eq!(tree.path_tokens(best).unwrap(), vec![464, 3290, 318]);
//! assert_eq!(tree.path_tokens(other).unwrap(), vec![464, 3290, 373]);
//! ```

mod node;
mod state;

pub use node::{NodeId, Prediction, TreeNode};
pub use state::{PredictionTree, SeedAnchor};
