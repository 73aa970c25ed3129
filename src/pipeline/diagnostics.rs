//! Fit diagnostics: the numbers behind the correlation, hold-out,
//! relevant-predictor and heatmap views of a model.

use super::fit::FittedModel;
use crate::error::{CodarfeError, Result};
use crate::model::{HuberRegressor, RandomForest};
use crate::normalize::clr_matrix;
use crate::ordination::{angular_order, correspondence_analysis, Scaling};
use crate::stats::pearson_test;
use log::info;
use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Added to every heatmap cell before ordination.
pub const HEATMAP_OFFSET: f64 = 0.001;

/// Training predictions against the observed target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingCorrelation {
    /// Forest predictions on the training table, original scale.
    pub predictions: Vec<f64>,
    pub target: Vec<f64>,
    /// Pearson r between target and predictions.
    pub r: f64,
    /// Two-sided p-value of r.
    pub p_value: f64,
}

/// Test errors of repeated random train/test splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldoutValidation {
    pub test_percent: usize,
    /// Mean absolute error of each repetition, original scale.
    pub maes: Vec<f64>,
}

impl HoldoutValidation {
    pub fn mean_mae(&self) -> f64 {
        self.maes.iter().sum::<f64>() / self.maes.len() as f64
    }
}

/// A selected taxon and its Huber coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantPredictor {
    pub taxon: String,
    pub coefficient: f64,
}

/// CLR abundances of the selected taxa laid out for a heatmap.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapData {
    /// Row labels, in ordination order.
    pub taxa: Vec<String>,
    /// Column labels, by descending target.
    pub sample_ids: Vec<String>,
    /// Target of each column.
    pub target: Vec<f64>,
    /// Taxa × samples. Zeros are raised to 0.5, then each taxon row is CLR-transformed.
    pub values: DMatrix<f64>,
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

impl FittedModel {
    /// Correlation between the observed target and the forest's training predictions.
    pub fn training_correlation(&self) -> Result<TrainingCorrelation> {
        let raw = self.forest.predict(&self.training_design()?)?;
        let predictions = self.transform.inverse(&raw);
        let (r, p_value) = pearson_test(&self.target, &predictions)?;

        Ok(TrainingCorrelation {
            predictions,
            target: self.target.clone(),
            r,
            p_value,
        })
    }

    /// Refit the forest on random splits and record the test error of each.
    ///
    /// Each repetition shuffles the samples with its own generator seeded
    /// from `seed + repetition`, holds out `ceil(n · test_percent / 100)` of
    /// them and trains on the rest with the model's forest settings.
    pub fn holdout_validation(
        &self,
        n_repetitions: usize,
        test_percent: usize,
        seed: u64,
    ) -> Result<HoldoutValidation> {
        check_range("n_repetitions", n_repetitions, 2, 1000)?;
        check_range("test_percent", test_percent, 1, 99)?;

        let x = self.training_design()?;
        let n = x.nrows();
        let n_test = (n * test_percent).div_ceil(100).max(1);
        if n_test >= n {
            return Err(CodarfeError::InvalidParameter(format!(
                "A {}% hold-out leaves no training samples out of {}",
                test_percent, n
            )));
        }
        let y_model = self.transform.forward(&self.target);
        let forest_config = self.config.forest_config();

        info!(
            "Hold-out validation: {} repetitions, {} test samples of {}",
            n_repetitions, n_test, n
        );

        let maes = (0..n_repetitions)
            .into_par_iter()
            .map(|rep| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(rep as u64));
                let mut indices: Vec<usize> = (0..n).collect();
                indices.shuffle(&mut rng);
                let (test, train) = indices.split_at(n_test);

                let y_train: Vec<f64> = train.iter().map(|&i| y_model[i]).collect();
                let forest = RandomForest::fit(&x.select_rows(train), &y_train, &forest_config)?;
                let predicted = self.transform.inverse(&forest.predict(&x.select_rows(test))?);

                let total: f64 = test
                    .iter()
                    .zip(&predicted)
                    .map(|(&i, p)| (self.target[i] - p).abs())
                    .sum();
                Ok(total / n_test as f64)
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(HoldoutValidation { test_percent, maes })
    }

    /// Huber coefficients of the selected taxa on the raw target, largest first.
    ///
    /// With more than `n_max_features` taxa, the strongest positive and
    /// strongest negative halves are kept; when one side has fewer than half,
    /// the other side fills the remaining slots.
    pub fn relevant_predictors(&self, n_max_features: usize) -> Result<Vec<RelevantPredictor>> {
        check_range("n_max_features", n_max_features, 2, 1000)?;

        let regressor = HuberRegressor::new(self.config.max_huber_iterations);
        let fit = regressor.fit(&self.training_design()?, &self.target)?;

        let mut predictors: Vec<RelevantPredictor> = self
            .selected_taxa()
            .iter()
            .zip(&fit.coefficients)
            .map(|(taxon, &coefficient)| RelevantPredictor {
                taxon: taxon.clone(),
                coefficient,
            })
            .collect();
        predictors.sort_by(|a, b| b.coefficient.total_cmp(&a.coefficient));

        let len = predictors.len();
        if len <= n_max_features {
            return Ok(predictors);
        }

        let half = n_max_features / 2;
        let n_pos = predictors.iter().filter(|p| p.coefficient > 0.0).count();
        let n_neg = predictors.iter().filter(|p| p.coefficient < 0.0).count();
        let (keep_pos, keep_neg) = if n_pos < half {
            (n_pos, 2 * half - n_pos)
        } else if n_neg < half {
            (2 * half - n_neg, n_neg)
        } else {
            (half, half)
        };

        Ok(predictors
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i < keep_pos || *i >= len - keep_neg)
            .map(|(_, p)| p)
            .collect())
    }

    /// Order of the selected taxa for a heatmap.
    ///
    /// Runs correspondence analysis on the selected relative abundances
    /// (non-finite cells set to zero, every cell offset by 0.001) and sorts
    /// taxa by the angle of their first two feature scores around the centroid.
    pub fn heatmap_order(&self) -> Result<Vec<String>> {
        let selected = self.training.select_taxa(self.selected_taxa())?;
        let x = selected
            .matrix()
            .map(|v| if v.is_finite() { v } else { 0.0 })
            .add_scalar(HEATMAP_OFFSET);

        let ca = correspondence_analysis(&x, Scaling::Samples)?;
        let order = angular_order(&ca.feature_scores)?;
        Ok(order.into_iter().map(|j| selected.taxa()[j].clone()).collect())
    }

    /// Heatmap rows in [`heatmap_order`](Self::heatmap_order), columns by descending target.
    pub fn heatmap_data(&self) -> Result<HeatmapData> {
        let taxa = self.heatmap_order()?;
        let selected = self.training.select_taxa(&taxa)?;

        let mut samples: Vec<usize> = (0..self.target.len()).collect();
        samples.sort_by(|&a, &b| self.target[b].total_cmp(&self.target[a]));

        let counts = DMatrix::from_fn(taxa.len(), samples.len(), |t, s| {
            let v = selected.get(samples[s], t);
            if v == 0.0 {
                0.5
            } else {
                v
            }
        });

        Ok(HeatmapData {
            taxa,
            sample_ids: samples
                .iter()
                .map(|&i| selected.sample_ids()[i].clone())
                .collect(),
            target: samples.iter().map(|&i| self.target[i]).collect(),
            values: clr_matrix(&counts),
        })
    }
}
