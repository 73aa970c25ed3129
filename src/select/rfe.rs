//! Recursive feature elimination driven by Huber coefficients.
//!
//! Each round CLR-transforms the surviving taxa, fits a Huber regressor,
//! scores the fit, then drops every zero-coefficient taxon plus the
//! weakest fixed-size batch of the rest. The removal count is set once from
//! the initial number of taxa, so every round shrinks the set by at least
//! one and the search always terminates.

use crate::data::CountTable;
use crate::error::{CodarfeError, Result};
use crate::model::HuberRegressor;
use crate::normalize::clr_matrix;
use crate::stats::{adjusted_r_squared, bic, cv_rmse, f_pvalue, kfold_splits, r_squared};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Separator used when a round's taxa are joined into one key.
pub const TAXA_KEY_SEPARATOR: char = '@';

/// Settings of one elimination search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfeConfig {
    /// Percentage of the initial taxa removed per round (1..=99).
    pub percent_removed: usize,
    /// Number of cross-validation folds.
    pub cv_folds: usize,
    /// Seed for fold shuffling.
    pub seed: u64,
    /// Iteration cap of the Huber regressor.
    pub max_huber_iterations: usize,
}

impl Default for RfeConfig {
    fn default() -> Self {
        Self {
            percent_removed: 1,
            cv_folds: 10,
            seed: 42,
            max_huber_iterations: 100,
        }
    }
}

impl RfeConfig {
    /// Taxa removed per round for a search starting from `n_taxa`.
    pub fn removal_count(&self, n_taxa: usize) -> usize {
        (n_taxa * self.percent_removed / 100).max(1)
    }
}

/// Metrics of one usable elimination round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Taxa in the round, ordered by importance in the previous round.
    pub taxa: Vec<String>,
    pub r2_adj: f64,
    pub f_pvalue: f64,
    pub bic: f64,
    pub rmse_cv: f64,
}

impl RoundRecord {
    /// The round's taxa joined into a single key.
    pub fn key(&self) -> String {
        self.taxa.join(&TAXA_KEY_SEPARATOR.to_string())
    }

    pub fn n_taxa(&self) -> usize {
        self.taxa.len()
    }

    /// Whether every metric is a finite number.
    pub fn is_finite(&self) -> bool {
        self.r2_adj.is_finite()
            && self.f_pvalue.is_finite()
            && self.bic.is_finite()
            && self.rmse_cv.is_finite()
    }
}

/// Run the elimination search on a (relative-abundance) table.
///
/// `y` is the target already on model scale. Rounds whose F-test p-value is
/// NaN or whose adjusted R² reaches 1 are evaluated but not recorded.
pub fn run_rfe(table: &CountTable, y: &[f64], config: &RfeConfig) -> Result<Vec<RoundRecord>> {
    let n_samples = table.n_samples();
    if y.len() != n_samples {
        return Err(CodarfeError::DimensionMismatch {
            expected: n_samples,
            actual: y.len(),
        });
    }
    if table.n_taxa() == 0 {
        return Err(CodarfeError::EmptyData("No taxa to select from".to_string()));
    }
    if !(1..=99).contains(&config.percent_removed) {
        return Err(CodarfeError::InvalidParameter(format!(
            "percent_removed must be in 1..=99, got {}",
            config.percent_removed
        )));
    }

    let n_remove = config.removal_count(table.n_taxa());
    let folds = kfold_splits(n_samples, config.cv_folds, config.seed)?;
    let regressor = HuberRegressor::new(config.max_huber_iterations);

    info!(
        "Starting RFE on {} taxa, removing {} per round",
        table.n_taxa(),
        n_remove
    );

    let mut current: Vec<usize> = (0..table.n_taxa()).collect();
    let mut records = Vec::new();
    let mut round = 0;

    while current.len() > 1 {
        round += 1;
        let k = current.len();
        let x = clr_matrix(&table.matrix().select_columns(&current));

        let fit = regressor.fit(&x, y)?;
        let pred = fit.predict(&x);

        let p = f_pvalue(&pred, y, k)?;
        let r2_adj = adjusted_r_squared(r_squared(&pred, y), n_samples, k);
        let round_bic = bic(&pred, y, k);
        let rmse = cv_rmse(&x, y, &regressor, &folds)?;

        debug!(
            "RFE round {}: {} taxa, R2 adj {:.4}, F p-value {:.3e}, BIC {}, RMSE-CV {:.4}",
            round, k, r2_adj, p, round_bic, rmse
        );

        if !p.is_nan() && r2_adj < 1.0 {
            records.push(RoundRecord {
                taxa: current.iter().map(|&j| table.taxa()[j].clone()).collect(),
                r2_adj,
                f_pvalue: p,
                bic: round_bic,
                rmse_cv: rmse,
            });
        }

        let mut ranked: Vec<(usize, f64)> = current
            .iter()
            .zip(&fit.coefficients)
            .filter(|(_, &c)| c != 0.0)
            .map(|(&j, c)| (j, c.abs()))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let keep = ranked.len().saturating_sub(n_remove);
        if keep == 0 {
            break;
        }
        ranked.truncate(keep);
        current = ranked.into_iter().map(|(j, _)| j).collect();
    }

    info!(
        "RFE finished after {} rounds with {} usable rounds",
        round,
        records.len()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::relative_abundance_matrix;
    use nalgebra::DMatrix;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn synthetic(n_samples: usize, n_taxa: usize, seed: u64) -> (CountTable, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let counts = DMatrix::from_fn(n_samples, n_taxa, |_, _| rng.gen_range(1.0..200.0));
        let rel = relative_abundance_matrix(&counts);
        let clr = clr_matrix(&rel);
        let y: Vec<f64> = (0..n_samples)
            .map(|i| 10.0 + 2.0 * clr[(i, 0)] - 1.5 * clr[(i, 1)] + rng.gen_range(-0.1..0.1))
            .collect();

        let table = CountTable::new(
            rel,
            (0..n_samples).map(|i| format!("s{}", i)).collect(),
            (0..n_taxa).map(|j| format!("taxon_{}", j)).collect(),
        )
        .unwrap();
        (table, y)
    }

    #[test]
    fn test_removal_count() {
        let config = RfeConfig::default();
        assert_eq!(config.removal_count(50), 1);
        assert_eq!(config.removal_count(1000), 10);

        let config = RfeConfig { percent_removed: 20, ..Default::default() };
        assert_eq!(config.removal_count(12), 2);
    }

    #[test]
    fn test_rounds_strictly_shrink() {
        let (table, y) = synthetic(30, 20, 1);
        let config = RfeConfig { percent_removed: 10, cv_folds: 5, ..Default::default() };
        let records = run_rfe(&table, &y, &config).unwrap();

        assert!(!records.is_empty());
        for pair in records.windows(2) {
            assert!(pair[1].n_taxa() < pair[0].n_taxa());
        }
        // A single taxon is never evaluated.
        assert!(records.iter().all(|r| r.n_taxa() >= 2));
    }

    #[test]
    fn test_high_removal_terminates() {
        let (table, y) = synthetic(25, 40, 2);
        let config = RfeConfig { percent_removed: 99, cv_folds: 5, ..Default::default() };
        let records = run_rfe(&table, &y, &config).unwrap();
        // 39 taxa go in the first round, so only one round runs.
        assert!(records.len() <= 1);
    }

    #[test]
    fn test_saturated_rounds_are_skipped() {
        let (table, y) = synthetic(15, 30, 3);
        let config = RfeConfig { percent_removed: 10, cv_folds: 3, ..Default::default() };
        let records = run_rfe(&table, &y, &config).unwrap();
        // With 15 or more taxa the adjusted R² exceeds 1.
        assert!(records.iter().all(|r| r.n_taxa() <= 14));
        assert!(records.iter().all(|r| r.r2_adj < 1.0));
        assert!(records.iter().any(|r| r.n_taxa() < 14));
    }

    #[test]
    fn test_informative_taxa_survive() {
        let (table, y) = synthetic(40, 12, 4);
        let config = RfeConfig { percent_removed: 10, cv_folds: 5, ..Default::default() };
        let records = run_rfe(&table, &y, &config).unwrap();

        let last = records.last().unwrap();
        assert_eq!(last.n_taxa(), 2);
        assert!(last.taxa.contains(&"taxon_0".to_string()));
        assert!(last.taxa.contains(&"taxon_1".to_string()));
    }

    #[test]
    fn test_key_joins_taxa() {
        let record = RoundRecord {
            taxa: vec!["a".to_string(), "b".to_string()],
            r2_adj: 0.5,
            f_pvalue: 0.01,
            bic: 10.0,
            rmse_cv: 1.0,
        };
        assert_eq!(record.key(), "a@b");
        assert!(record.is_finite());
    }

    #[test]
    fn test_rejects_bad_percentage() {
        let (table, y) = synthetic(10, 5, 5);
        let config = RfeConfig { percent_removed: 0, cv_folds: 2, ..Default::default() };
        assert!(run_rfe(&table, &y, &config).is_err());
    }
}
