//! CART regression trees.
//!
//! Nodes are stored flat in pre-order. `feature == -1` marks a leaf; internal nodes send a
//! row left when `row[feature] <= threshold` (NaN also goes left) and right otherwise.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Splits that reduce squared error by less than this are not taken.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionNode {
    /// Feature index to split on (-1 for leaf nodes).
    pub feature: i32,
    pub threshold: f64,
    /// Child indices (-1 for leaf nodes).
    pub left: i32,
    pub right: i32,
    /// Leaf prediction (None for internal nodes).
    pub value: Option<f64>,
}

impl RegressionNode {
    fn leaf(value: f64) -> Self {
        Self {
            feature: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            value: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature == -1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    #[inline]
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return node.value.unwrap_or(0.0);
            }

            let v = row.get(node.feature as usize).copied().unwrap_or(f64::NAN);
            idx = if v.is_nan() || v <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    /// Structural check for trees read from disk.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let n = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.value {
                    Some(v) if v.is_finite() => {}
                    _ => return Err(format!("leaf node {i} has no finite value")),
                }
                continue;
            }
            if node.feature < 0 || node.feature as usize >= n_features {
                return Err(format!("node {i} has invalid feature index {}", node.feature));
            }
            // Pre-order layout: children always come after their parent.
            if node.left <= i as i32 || node.left >= n {
                return Err(format!("node {i} has invalid left child {}", node.left));
            }
            if node.right <= i as i32 || node.right >= n {
                return Err(format!("node {i} has invalid right child {}", node.right));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Fits a tree to `targets` and adds each split's squared-error reduction to `importances`.
pub(crate) fn fit_tree(
    rows: &[Vec<f64>],
    targets: &[f64],
    params: TreeParams,
    importances: &mut [f64],
) -> RegressionTree {
    let mut builder = TreeBuilder {
        rows,
        targets,
        params,
        nodes: Vec::new(),
        importances,
    };
    let indices: Vec<usize> = (0..rows.len()).collect();
    builder.build(indices, 0);
    RegressionTree {
        nodes: builder.nodes,
    }
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    targets: &'a [f64],
    params: TreeParams,
    nodes: Vec<RegressionNode>,
    importances: &'a mut [f64],
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let mean = indices.iter().map(|&i| self.targets[i]).sum::<f64>() / indices.len() as f64;
        self.nodes.push(RegressionNode::leaf(mean));

        if depth >= self.params.max_depth || indices.len() < self.params.min_samples_split {
            return idx;
        }
        let Some(split) = self.best_split(&indices) else {
            return idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.rows[i][split.feature] <= split.threshold);

        self.importances[split.feature] += split.gain;
        let left_idx = self.build(left, depth + 1);
        let right_idx = self.build(right, depth + 1);

        self.nodes[idx] = RegressionNode {
            feature: split.feature as i32,
            threshold: split.threshold,
            left: left_idx as i32,
            right: right_idx as i32,
            value: None,
        };
        idx
    }

    /// Exhaustive search. Ties go to the lowest feature index, then the lowest threshold.
    fn best_split(&self, indices: &[usize]) -> Option<Split> {
        let n_features = self.rows.first().map(Vec::len).unwrap_or(0);
        let per_feature: Vec<Option<Split>> = (0..n_features)
            .into_par_iter()
            .map(|f| self.best_split_for_feature(indices, f))
            .collect();

        let mut best: Option<Split> = None;
        for split in per_feature.into_iter().flatten() {
            if best.map_or(true, |b| split.gain > b.gain) {
                best = Some(split);
            }
        }
        best.filter(|s| s.gain > MIN_GAIN)
    }

    fn best_split_for_feature(&self, indices: &[usize], feature: usize) -> Option<Split> {
        let mut sorted: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (self.rows[i][feature], self.targets[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let total: f64 = sorted.iter().map(|(_, y)| y).sum();
        let parent_score = total * total / n as f64;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<Split> = None;
        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += sorted[k - 1].1;
            let (a, b) = (sorted[k - 1].0, sorted[k].0);
            if a == b || k < min_leaf || n - k < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64
                - parent_score;
            if best.map_or(true, |s| gain > s.gain) {
                let mut threshold = a + (b - a) / 2.0;
                if threshold >= b {
                    threshold = a;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
        best
    }
}
