//! Composite scoring of elimination rounds.
//!
//! Each metric is min-max normalized across rounds. The F-test p-value is
//! first mapped to `-log10(p)`. BIC and CV RMSE are inverted after
//! normalization since lower is better for both.

use super::rfe::RoundRecord;
use crate::error::{CodarfeError, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Weights of the four normalized metrics in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub r2_adj: f64,
    pub f_pvalue: f64,
    pub bic: f64,
    pub rmse_cv: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            r2_adj: 1.0,
            f_pvalue: 0.5,
            bic: 1.0,
            rmse_cv: 1.5,
        }
    }
}

/// The winning round: its taxa, raw metrics and composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResults {
    pub taxa: Vec<String>,
    pub r2_adj: f64,
    pub f_pvalue: f64,
    pub bic: f64,
    pub rmse_cv: f64,
    pub score: f64,
}

/// Min-max normalize to `[0, 1]`. A constant column maps to all zeros.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    if range == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - lo) / range).collect()
}

fn neg_log10(p: f64) -> f64 {
    if p == 0.0 {
        f64::MAX
    } else {
        -p.log10()
    }
}

/// Score every round and select the best one.
///
/// Rounds with a non-finite metric are dropped first. Ties go to the
/// earliest round.
pub fn score_and_select(records: &[RoundRecord], weights: &ScoreWeights) -> Result<SelectionResults> {
    let usable: Vec<&RoundRecord> = records.iter().filter(|r| r.is_finite()).collect();
    if usable.is_empty() {
        return Err(CodarfeError::NoUsableRounds);
    }

    let column = |f: fn(&RoundRecord) -> f64| -> Vec<f64> { usable.iter().map(|r| f(r)).collect() };

    let r2 = min_max_normalize(&column(|r| r.r2_adj));
    let f = min_max_normalize(&column(|r| neg_log10(r.f_pvalue)));
    let b = min_max_normalize(&column(|r| r.bic));
    let m = min_max_normalize(&column(|r| r.rmse_cv));

    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for i in 0..usable.len() {
        let score = r2[i] * weights.r2_adj
            + f[i] * weights.f_pvalue
            + (1.0 - b[i]).clamp(0.0, 1.0) * weights.bic
            + (1.0 - m[i]).clamp(0.0, 1.0) * weights.rmse_cv;
        if score > best_score {
            best = i;
            best_score = score;
        }
    }

    let winner = usable[best];
    info!(
        "Selected {} taxa (score {:.4}) out of {} scored rounds",
        winner.n_taxa(),
        best_score,
        usable.len()
    );

    Ok(SelectionResults {
        taxa: winner.taxa.clone(),
        r2_adj: winner.r2_adj,
        f_pvalue: winner.f_pvalue,
        bic: winner.bic,
        rmse_cv: winner.rmse_cv,
        score: best_score,
    })
}
