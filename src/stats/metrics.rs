//! Goodness-of-fit statistics for a fitted linear model.
//!
//! All functions take predictions `pred`, truths `y`, and the number of
//! feature columns `k` of the design (no intercept column).

use crate::error::{CodarfeError, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::f64::consts::PI;

/// Sum of squared residuals.
pub fn ssr(pred: &[f64], y: &[f64]) -> f64 {
    y.iter().zip(pred).map(|(t, p)| (t - p).powi(2)).sum()
}

/// Total sum of squares around the mean of `y`.
pub fn centered_tss(y: &[f64]) -> f64 {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    y.iter().map(|t| (t - mean).powi(2)).sum()
}

/// Centered R² = 1 - SSR / TSS.
pub fn r_squared(pred: &[f64], y: &[f64]) -> f64 {
    1.0 - ssr(pred, y) / centered_tss(y)
}

/// Adjusted R² = 1 - (1 - R²)(n - 1)/(n - k - 1).
///
/// Not clamped: with `k >= n - 1` the value leaves `(-inf, 1]` or becomes
/// non-finite, and callers filter such rounds out.
pub fn adjusted_r_squared(r2: f64, n: usize, k: usize) -> f64 {
    let n = n as f64;
    let k = k as f64;
    1.0 - (1.0 - r2) * (n - 1.0) / (n - k - 1.0)
}

/// Upper-tail probability of the overall F-test.
///
/// Uses `df_model = max(1, k - 1)` and `df_resid = max(1, n - df_model - 1)`
/// with the centered decomposition `ESS = TSS - SSR`.
pub fn f_pvalue(pred: &[f64], y: &[f64], k: usize) -> Result<f64> {
    let n = y.len();
    let df_model = k.saturating_sub(1).max(1);
    let df_resid = n.saturating_sub(df_model + 1).max(1);

    let residual_ss = ssr(pred, y);
    let mse_model = (centered_tss(y) - residual_ss) / df_model as f64;
    let mse_resid = residual_ss / df_resid as f64;
    let f_statistic = mse_model / mse_resid;

    if f_statistic.is_nan() {
        return Ok(f64::NAN);
    }
    if f_statistic == f64::INFINITY {
        return Ok(0.0);
    }
    if f_statistic <= 0.0 {
        return Ok(1.0);
    }

    let dist = FisherSnedecor::new(df_model as f64, df_resid as f64)
        .map_err(|e| CodarfeError::Numerical(format!("F distribution: {}", e)))?;
    Ok(dist.sf(f_statistic))
}

/// Gaussian log-likelihood of the residuals:
/// -(n/2)ln(2π) - (n/2)ln(SSR/n) - n/2.
pub fn log_likelihood(pred: &[f64], y: &[f64]) -> f64 {
    let n = y.len() as f64;
    let half_n = n / 2.0;
    -half_n * (2.0 * PI).ln() - half_n * (ssr(pred, y) / n).ln() - half_n
}

/// BIC = -2 llf + ln(n) k, rounded to the nearest integer.
pub fn bic(pred: &[f64], y: &[f64], k: usize) -> f64 {
    let n = y.len() as f64;
    (-2.0 * log_likelihood(pred, y) + n.ln() * k as f64).round_ties_even()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn example() -> (Vec<f64>, Vec<f64>) {
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let pred = vec![1.1, 1.9, 3.2, 3.8, 5.1, 6.1, 6.8, 8.2];
        (pred, y)
    }

    #[test]
    fn test_r_squared() {
        let (pred, y) = example();
        // SSR = 0.01+0.01+0.04+0.04+0.01+0.01+0.04+0.04 = 0.2; TSS = 42
        assert_relative_eq!(ssr(&pred, &y), 0.2, epsilon = 1e-12);
        assert_relative_eq!(r_squared(&pred, &y), 1.0 - 0.2 / 42.0, epsilon = 1e-12);
    }

    #[test]
    fn test_adjusted_r_squared() {
        let r2 = 0.9;
        assert_relative_eq!(adjusted_r_squared(r2, 20, 3), 1.0 - 0.1 * 19.0 / 16.0, epsilon = 1e-12);
        // Saturated designs fall outside the usable range.
        assert!(adjusted_r_squared(r2, 5, 6) > 1.0);
        assert!(!adjusted_r_squared(r2, 5, 4).is_finite());
    }

    #[test]
    fn test_f_pvalue_significant_fit() {
        let (pred, y) = example();
        let p = f_pvalue(&pred, &y, 2).unwrap();
        assert!(p < 1e-6, "p = {}", p);
    }

    #[test]
    fn test_f_pvalue_no_fit() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let mean = vec![2.5; 4];
        // ESS is zero, so the statistic is zero.
        assert_relative_eq!(f_pvalue(&mean, &y, 2).unwrap(), 1.0);
    }

    #[test]
    fn test_f_pvalue_perfect_fit() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(f_pvalue(&y, &y, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_bic_matches_formula() {
        let (pred, y) = example();
        let n = 8.0_f64;
        let llf = -4.0 * (2.0 * PI).ln() - 4.0 * (0.2 / n).ln() - 4.0;
        assert_relative_eq!(log_likelihood(&pred, &y), llf, epsilon = 1e-10);
        assert_eq!(bic(&pred, &y, 3), (-2.0 * llf + n.ln() * 3.0).round());
    }

    #[test]
    fn test_bic_perfect_fit_not_finite() {
        let y = vec![1.0, 2.0, 3.0];
        assert!(!bic(&y, &y, 1).is_finite());
    }
}
