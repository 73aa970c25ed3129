//! Regression tree split on Poisson deviance.

use crate::error::{CodarfeError, Result};
use nalgebra::DMatrix;
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Child sums at or below this are invalid for the Poisson criterion.
const POISSON_EPSILON: f64 = f64::EPSILON;

/// A single node in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split node; samples with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node predicting the mean target of its samples.
    Leaf { value: f64 },
}

/// Growth limits for a tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node.
    pub min_samples_split: usize,
    /// Minimum samples in each child.
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` uses all.
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// A regression tree stored as a flat arena with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

impl RegressionTree {
    /// Fit a tree on the rows of `x` listed in `sample_indices`.
    ///
    /// Indices may repeat (bootstrap samples). Targets must be non-negative.
    pub fn fit<R: Rng>(
        x: &DMatrix<f64>,
        y: &[f64],
        sample_indices: &[usize],
        config: &TreeConfig,
        rng: &mut R,
    ) -> Result<Self> {
        if sample_indices.is_empty() {
            return Err(CodarfeError::EmptyData("Empty sample set".to_string()));
        }
        if y.len() != x.nrows() {
            return Err(CodarfeError::DimensionMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }

        let mut builder = TreeBuilder {
            x,
            y,
            config,
            nodes: Vec::new(),
        };
        let mut indices = sample_indices.to_vec();
        builder.build(&mut indices, 0, rng);

        Ok(Self {
            nodes: builder.nodes,
            n_features: x.ncols(),
        })
    }

    /// Predict the target for one sample.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

struct TreeBuilder<'a> {
    x: &'a DMatrix<f64>,
    y: &'a [f64],
    config: &'a TreeConfig,
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    proxy: f64,
}

impl TreeBuilder<'_> {
    /// Build the subtree for `indices` and return its arena index.
    fn build<R: Rng>(&mut self, indices: &mut [usize], depth: usize, rng: &mut R) -> usize {
        let n = indices.len();
        let mean = indices.iter().map(|&i| self.y[i]).sum::<f64>() / n as f64;

        let depth_reached = self.config.max_depth.is_some_and(|d| depth >= d);
        let pure = indices.iter().all(|&i| self.y[i] == self.y[indices[0]]);
        if depth_reached || pure || n < self.config.min_samples_split.max(2) {
            return self.push(TreeNode::Leaf { value: mean });
        }

        let Some(best) = self.best_split(indices, rng) else {
            return self.push(TreeNode::Leaf { value: mean });
        };

        let (left_part, right_part) = partition(indices, |i| self.x[(i, best.feature)] <= best.threshold);

        // Reserve the slot so children land after their parent.
        let node_idx = self.push(TreeNode::Leaf { value: mean });
        let left = self.build(left_part, depth + 1, rng);
        let right = self.build(right_part, depth + 1, rng);
        self.nodes[node_idx] = TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_idx
    }

    fn push(&mut self, node: TreeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Best split under the Poisson proxy `Σ_children S·ln(S / n)`.
    ///
    /// Minimizing the summed half Poisson deviance of the children is the
    /// same as maximizing this proxy, since `Σ y ln y` is fixed per node.
    fn best_split<R: Rng>(&self, indices: &[usize], rng: &mut R) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let candidates: Vec<usize> = match self.config.max_features {
            Some(m) if m < n_features => sample(rng, n_features, m.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        };

        let min_leaf = self.config.min_samples_leaf.max(1);
        let n = indices.len();
        let total: f64 = indices.iter().map(|&i| self.y[i]).sum();

        let mut best: Option<BestSplit> = None;
        let mut order: Vec<(f64, f64)> = Vec::with_capacity(n);
        for &feature in &candidates {
            order.clear();
            order.extend(indices.iter().map(|&i| (self.x[(i, feature)], self.y[i])));
            order.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += order[k].1;
                let n_left = k + 1;
                let n_right = n - n_left;
                if order[k].0 >= order[k + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                if left_sum <= POISSON_EPSILON || right_sum <= POISSON_EPSILON {
                    continue;
                }
                let proxy = left_sum * (left_sum / n_left as f64).ln()
                    + right_sum * (right_sum / n_right as f64).ln();
                if best.as_ref().map_or(true, |b| proxy > b.proxy) {
                    let mut threshold = (order[k].0 + order[k + 1].0) / 2.0;
                    // Midpoint can round up to the right value.
                    if threshold >= order[k + 1].0 {
                        threshold = order[k].0;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        proxy,
                    });
                }
            }
        }
        best
    }
}

/// Reorder `indices` so elements matching `goes_left` come first.
fn partition<F: Fn(usize) -> bool>(indices: &mut [usize], goes_left: F) -> (&mut [usize], &mut [usize]) {
    let mut split = 0;
    for k in 0..indices.len() {
        if goes_left(indices[k]) {
            indices.swap(split, k);
            split += 1;
        }
    }
    indices.split_at_mut(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn step_data() -> (DMatrix<f64>, Vec<f64>) {
        // y jumps from 2 to 10 when x0 crosses 0.5; x1 is noise.
        let x = DMatrix::from_row_slice(6, 2, &[
            0.1, 0.9,
            0.2, 0.1,
            0.3, 0.5,
            0.7, 0.4,
            0.8, 0.8,
            0.9, 0.2,
        ]);
        let y = vec![2.0, 2.0, 2.0, 10.0, 10.0, 10.0];
        (x, y)
    }

    #[test]
    fn test_single_split_on_step() {
        let (x, y) = step_data();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree =
            RegressionTree::fit(&x, &y, &[0, 1, 2, 3, 4, 5], &TreeConfig::default(), &mut rng).unwrap();

        assert_eq!(tree.n_leaves(), 2);
        match &tree.nodes()[0] {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_relative_eq!(*threshold, 0.5, epsilon = 1e-12);
            }
            other => panic!("expected split at root, got {:?}", other),
        }
        assert_relative_eq!(tree.predict_row(&[0.0, 0.0]), 2.0);
        assert_relative_eq!(tree.predict_row(&[1.0, 0.0]), 10.0);
    }

    #[test]
    fn test_max_depth_zero_is_mean_leaf() {
        let (x, y) = step_data();
        let config = TreeConfig {
            max_depth: Some(0),
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, &[0, 1, 2, 3, 4, 5], &config, &mut rng).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        assert_relative_eq!(tree.predict_row(&[0.5, 0.5]), 6.0);
    }

    #[test]
    fn test_repeated_indices_weight_the_mean() {
        let (x, y) = step_data();
        let config = TreeConfig {
            max_depth: Some(0),
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, &[0, 0, 0, 3], &config, &mut rng).unwrap();
        assert_relative_eq!(tree.predict_row(&[0.5, 0.5]), 4.0);
    }

    #[test]
    fn test_zero_targets_do_not_split() {
        let (x, _) = step_data();
        let y = vec![0.0, 0.0, 0.0, 0.0, 0.0, 3.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree =
            RegressionTree::fit(&x, &y, &[0, 1, 2, 3, 4, 5], &TreeConfig::default(), &mut rng).unwrap();
        // Every split leaves one child with a zero target sum.
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_empty_sample_set() {
        let (x, y) = step_data();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(RegressionTree::fit(&x, &y, &[], &TreeConfig::default(), &mut rng).is_err());
    }
}
