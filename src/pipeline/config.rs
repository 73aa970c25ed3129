//! Fit-time configuration.

use crate::error::{CodarfeError, Result};
use crate::model::{ForestConfig, TreeConfig};
use crate::select::{RfeConfig, ScoreWeights};
use serde::{Deserialize, Serialize};

/// Every option that shapes a fit.
///
/// Missing YAML keys take their default; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// Drop taxa with variance below an eighth of the mean variance.
    pub remove_low_variance_features: bool,
    /// Convert counts to proportions before the search.
    pub apply_relative_abundance: bool,
    /// Allow the sqrt-rescale target transform on highly dispersed targets.
    pub allow_target_transform_on_high_variance: bool,
    /// Percentage of the initial taxa dropped per elimination round (1..=99).
    pub fraction_removed_per_round: usize,
    /// Cross-validation folds for RMSE (2..=100, at most the sample count).
    pub cv_folds: usize,
    pub weight_r2: f64,
    pub weight_f: f64,
    pub weight_bic: f64,
    pub weight_rmse: f64,
    /// Iteration cap of the Huber regressor (2..=1000).
    pub max_huber_iterations: usize,
    /// Seed for fold shuffling and forest bootstrap.
    pub seed: u64,
    /// Trees in the final forest (1..=1000).
    pub n_trees: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        let weights = ScoreWeights::default();
        Self {
            remove_low_variance_features: true,
            apply_relative_abundance: true,
            allow_target_transform_on_high_variance: true,
            fraction_removed_per_round: 1,
            cv_folds: 10,
            weight_r2: weights.r2_adj,
            weight_f: weights.f_pvalue,
            weight_bic: weights.bic,
            weight_rmse: weights.rmse_cv,
            max_huber_iterations: 100,
            seed: 42,
            n_trees: 160,
        }
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CodarfeError::InvalidParameter(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )))
    }
}

fn check_weight(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CodarfeError::InvalidParameter(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}

impl FitConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(CodarfeError::from)
    }

    /// Check every option against its allowed range.
    pub fn validate(&self) -> Result<()> {
        check_range("fraction_removed_per_round", self.fraction_removed_per_round, 1, 99)?;
        check_range("cv_folds", self.cv_folds, 2, 100)?;
        check_range("max_huber_iterations", self.max_huber_iterations, 2, 1000)?;
        check_range("n_trees", self.n_trees, 1, 1000)?;
        check_weight("weight_r2", self.weight_r2)?;
        check_weight("weight_f", self.weight_f)?;
        check_weight("weight_bic", self.weight_bic)?;
        check_weight("weight_rmse", self.weight_rmse)?;
        Ok(())
    }

    pub fn with_low_variance_removal(mut self, enabled: bool) -> Self {
        self.remove_low_variance_features = enabled;
        self
    }

    pub fn with_relative_abundance(mut self, enabled: bool) -> Self {
        self.apply_relative_abundance = enabled;
        self
    }

    pub fn with_target_transform(mut self, enabled: bool) -> Self {
        self.allow_target_transform_on_high_variance = enabled;
        self
    }

    pub fn with_fraction_removed(mut self, percent: usize) -> Self {
        self.fraction_removed_per_round = percent;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Set all four score weights at once.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weight_r2 = weights.r2_adj;
        self.weight_f = weights.f_pvalue;
        self.weight_bic = weights.bic;
        self.weight_rmse = weights.rmse_cv;
        self
    }

    pub fn with_max_huber_iterations(mut self, max_iter: usize) -> Self {
        self.max_huber_iterations = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn score_weights(&self) -> ScoreWeights {
        ScoreWeights {
            r2_adj: self.weight_r2,
            f_pvalue: self.weight_f,
            bic: self.weight_bic,
            rmse_cv: self.weight_rmse,
        }
    }

    pub fn rfe_config(&self) -> RfeConfig {
        RfeConfig {
            percent_removed: self.fraction_removed_per_round,
            cv_folds: self.cv_folds,
            seed: self.seed,
            max_huber_iterations: self.max_huber_iterations,
        }
    }

    /// Forest settings: bootstrap, all features per split, fully grown trees.
    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_trees,
            seed: self.seed,
            bootstrap: true,
            tree: TreeConfig::default(),
        }
    }
}
