//! Isolation-Forest scorer.
//!
//! Trees are fitted offline and exported as a JSON artifact; this module only
//! evaluates them. The anomaly score is the standard normalized path-length
//! statistic `2^(-E[h(x)] / c(n))`, higher = more anomalous.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Euler-Mascheroni constant, used in the average-path-length normalizer.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// One node of a fitted isolation tree. Children are indices into the
/// tree's node vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        size: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    pub trees: Vec<IsolationTree>,
    /// Subsample size used at fit time; normalizes path lengths.
    pub subsample_size: u32,
}

impl IsolationForest {
    pub fn from_json(bytes: &[u8]) -> CoreResult<Self> {
        let forest: IsolationForest = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::Artifact(format!("isolation forest parse: {}", e)))?;
        if forest.trees.is_empty() {
            return Err(CoreError::Artifact("isolation forest has no trees".into()));
        }
        Ok(forest)
    }

    /// Anomaly score in [0, 1] for one feature vector.
    pub fn score(&self, features: &[f32]) -> f32 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|t| path_length(t, features))
            .sum::<f64>()
            / self.trees.len() as f64;

        let c = average_path_length(self.subsample_size);
        if c <= 0.0 {
            return 0.0;
        }
        let score = 2f64.powf(-mean_path / c);
        score.clamp(0.0, 1.0) as f32
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

/// Depth at which a point lands in a tree, plus the leaf's own
/// average-path correction.
fn path_length(tree: &IsolationTree, features: &[f32]) -> f64 {
    let mut index = 0usize;
    let mut depth = 0.0f64;
    // Node count bounds the walk; a malformed artifact cannot loop forever.
    for _ in 0..tree.nodes.len() {
        match tree.nodes.get(index) {
            Some(TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            }) => {
                let value = features.get(*feature).copied().unwrap_or(0.0);
                index = if value < *threshold { *left } else { *right };
                depth += 1.0;
            }
            Some(TreeNode::Leaf { size }) => {
                return depth + average_path_length(*size);
            }
            None => return depth,
        }
    }
    depth
}

/// Expected path length of an unsuccessful BST search over n points.
fn average_path_length(n: u32) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}
