//! K-fold cross-validation of the Huber regressor.

use crate::error::{CodarfeError, Result};
use crate::model::HuberRegressor;
use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// One train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Training row indices, ascending.
    pub train: Vec<usize>,
    /// Test row indices, ascending.
    pub test: Vec<usize>,
}

/// Shuffled k-fold partition of `0..n`.
///
/// Indices are shuffled once with the seeded generator, then cut into `k`
/// contiguous chunks; the first `n % k` chunks hold one extra index. The
/// same `(n, k, seed)` always yields the same folds.
pub fn kfold_splits(n: usize, k: usize, seed: u64) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(CodarfeError::InvalidParameter(format!(
            "Number of folds must be at least 2, got {}",
            k
        )));
    }
    if k > n {
        return Err(CodarfeError::InvalidParameter(format!(
            "Cannot split {} samples into {} folds",
            n, k
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let size = base + usize::from(f < extra);
        let mut in_test = vec![false; n];
        for &i in &indices[start..start + size] {
            in_test[i] = true;
        }
        start += size;

        let (test, train): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| in_test[i]);
        folds.push(Fold { train, test });
    }
    Ok(folds)
}

/// Mean over folds of the test RMSE of a Huber fit trained on the other folds.
pub fn cv_rmse(
    x: &DMatrix<f64>,
    y: &[f64],
    regressor: &HuberRegressor,
    folds: &[Fold],
) -> Result<f64> {
    if folds.is_empty() {
        return Err(CodarfeError::InvalidParameter("No folds given".to_string()));
    }

    let rmses = folds
        .par_iter()
        .map(|fold| {
            let x_train = x.select_rows(&fold.train);
            let y_train: Vec<f64> = fold.train.iter().map(|&i| y[i]).collect();
            let fit = regressor.fit(&x_train, &y_train)?;

            let pred = fit.predict(&x.select_rows(&fold.test));
            let mse = fold
                .test
                .iter()
                .zip(&pred)
                .map(|(&i, p)| (y[i] - p).powi(2))
                .sum::<f64>()
                / fold.test.len() as f64;
            Ok(mse.sqrt())
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(rmses.iter().sum::<f64>() / rmses.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_folds_partition_samples() {
        let folds = kfold_splits(23, 5, 42).unwrap();
        assert_eq!(folds.len(), 5);

        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);

        let mut seen = HashSet::new();
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 23);
            for &i in &fold.test {
                assert!(seen.insert(i), "index {} in two test folds", i);
                assert!(!fold.train.contains(&i));
            }
        }
        assert_eq!(seen.len(), 23);
    }

    #[test]
    fn test_folds_reproducible() {
        assert_eq!(kfold_splits(30, 10, 42).unwrap(), kfold_splits(30, 10, 42).unwrap());
        assert_ne!(kfold_splits(30, 10, 42).unwrap(), kfold_splits(30, 10, 7).unwrap());
    }

    #[test]
    fn test_too_many_folds() {
        assert!(kfold_splits(3, 5, 42).is_err());
        assert!(kfold_splits(10, 1, 42).is_err());
    }

    #[test]
    fn test_cv_rmse_near_zero_for_exact_line() {
        let x = DMatrix::from_fn(20, 1, |i, _| i as f64);
        let y: Vec<f64> = (0..20).map(|i| 3.0 + 0.5 * i as f64).collect();
        let folds = kfold_splits(20, 4, 42).unwrap();

        let rmse = cv_rmse(&x, &y, &HuberRegressor::new(100), &folds).unwrap();
        assert!(rmse < 1e-2, "rmse = {}", rmse);
    }
}
