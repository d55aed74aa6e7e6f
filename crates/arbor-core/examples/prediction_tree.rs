//! Prediction tree example.
//!
//! Expands a small branching tree over a toy language model and compares
//! greedy decoding with best-path decoding.

use arbor_core::model::FnEngine;
use arbor_core::search::{decode_best_path, decode_greedy, ExpanderConfig, Traversal, TreeExpander};
use arbor_core::tree::{NodeId, PredictionTree, SeedAnchor};

/// Mock vocabulary for demonstration.
const VOCAB: &[&str] = &[
    "<pad>", "<eos>", "the", "a", "cat", "dog", "sat", "ran", "on", "mat", "quick", "lazy",
];

/// Simulates next-token logits for the last token of a sequence.
fn mock_next_token_logits(sequence: &[u32]) -> Vec<f32> {
    let last_token = sequence.last().copied().unwrap_or(0);
    let mut logits = vec![-10.0f32; VOCAB.len()];

    match last_token {
        2 | 3 => {
            // Article -> adjective or noun; "quick" leads to a stronger path
            logits[4] = 2.0; // cat
            logits[10] = 1.8; // quick
            logits[5] = 1.5; // dog
        }
        4 | 5 => {
            logits[6] = 1.2; // sat
            logits[7] = 1.0; // ran
            logits[1] = 0.8; // eos
        }
        6 | 7 => {
            logits[8] = 3.0; // on
            logits[1] = 0.5; // eos
        }
        8 => {
            logits[2] = 1.5; // the
            logits[9] = 2.0; // mat
        }
        10 | 11 => {
            logits[5] = 4.0; // dog
            logits[4] = 1.0; // cat
        }
        _ => {
            logits[2] = 3.0; // the
            logits[3] = 2.0; // a
        }
    }

    logits
}

/// Decode tokens to text.
fn decode(tokens: &[u32]) -> String {
    tokens
        .iter()
        .filter_map(|&t| VOCAB.get(t as usize).copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_subtree(tree: &PredictionTree, node: NodeId, indent: usize) {
    for &child in tree.children(node).unwrap() {
        let child_node = tree.node(child).unwrap();
        let prediction = child_node.state().unwrap();
        println!(
            "{}{} ({:.3})",
            "  ".repeat(indent),
            VOCAB[prediction.token as usize],
            prediction.confidence
        );
        print_subtree(tree, child, indent + 1);
    }
}

fn main() {
    println!("=== Prediction Tree Demo ===\n");

    let engine = FnEngine::new(VOCAB.len(), mock_next_token_logits);
    let config = ExpanderConfig {
        top_k: 3,
        max_depth: 3,
        traversal: Traversal::Parallel,
        ..Default::default()
    };

    println!("Configuration:");
    println!("  Branching (top_k): {}", config.top_k);
    println!("  Depth budget: {}", config.max_depth);
    println!("  Traversal: {:?}", config.traversal);
    println!();

    // Prompt: "the"
    let (mut tree, leaf) = PredictionTree::seed_from_tokens(&[2], SeedAnchor::Leaf);
    let expander = TreeExpander::new(&engine, config);
    let report = expander.expand(&mut tree, leaf).unwrap();

    println!(
        "Expanded {} nodes with {} inference calls\n",
        report.nodes_added, report.inference_calls
    );

    println!("the");
    print_subtree(&tree, leaf, 1);

    println!("\n=== Decoding ===\n");

    let greedy = decode_greedy(&tree, leaf, 3).unwrap();
    let greedy_score = tree
        .leaves(leaf)
        .unwrap()
        .into_iter()
        .find(|&l| tree.path_tokens(l).unwrap()[1..] == greedy[..])
        .map(|l| tree.path_log_prob(leaf, l).unwrap())
        .unwrap_or(f64::NEG_INFINITY);
    println!("Greedy:    \"the {}\" (log prob: {:.3})", decode(&greedy), greedy_score);

    let best = decode_best_path(&tree, leaf, 3).unwrap();
    println!("Best path: \"the {}\" (log prob: {:.3})", decode(&best.tokens), best.log_prob);

    println!("\n=== Prediction Tree Demo Complete ===");
}
