//! Random forest regressor with the Poisson splitting criterion.
//!
//! A bagged ensemble of [`RegressionTree`]s. Each tree draws its bootstrap
//! sample from its own generator seeded with `seed + tree_index`, so trees
//! can be grown in parallel and still reproduce a sequential run exactly.

use super::tree::{RegressionTree, TreeConfig};
use crate::error::{CodarfeError, Result};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for forest training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Random seed for bootstrap sampling.
    pub seed: u64,
    /// Draw a bootstrap sample per tree; otherwise every tree sees all rows.
    pub bootstrap: bool,
    /// Per-tree growth limits.
    pub tree: TreeConfig,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 160,
            seed: 42,
            bootstrap: true,
            tree: TreeConfig::default(),
        }
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit a forest on a samples × features matrix.
    ///
    /// # Errors
    /// Fails on empty input, mismatched dimensions, zero trees, or targets
    /// that are negative or sum to zero (unsupported by the Poisson criterion).
    pub fn fit(x: &DMatrix<f64>, y: &[f64], config: &ForestConfig) -> Result<Self> {
        let (n_samples, n_features) = x.shape();
        if n_samples == 0 || n_features == 0 {
            return Err(CodarfeError::EmptyData(
                "Cannot fit a forest on an empty matrix".to_string(),
            ));
        }
        if y.len() != n_samples {
            return Err(CodarfeError::DimensionMismatch {
                expected: n_samples,
                actual: y.len(),
            });
        }
        if config.n_trees == 0 {
            return Err(CodarfeError::InvalidParameter(
                "n_trees must be > 0".to_string(),
            ));
        }
        if y.iter().any(|&v| !(v >= 0.0)) || y.iter().sum::<f64>() <= 0.0 {
            return Err(CodarfeError::Numerical(
                "Poisson criterion requires non-negative targets with a positive sum".to_string(),
            ));
        }

        let trees = (0..config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let sample_indices: Vec<usize> = if config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                RegressionTree::fit(x, y, &sample_indices, &config.tree, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { trees, n_features })
    }

    /// Predict the target for one sample as the mean over trees.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    /// Predict targets for every row of a samples × features matrix.
    pub fn predict(&self, x: &DMatrix<f64>) -> Result<Vec<f64>> {
        if x.ncols() != self.n_features {
            return Err(CodarfeError::DimensionMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row: Vec<f64> = x.row(i).iter().copied().collect();
                self.predict_row(&row)
            })
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
