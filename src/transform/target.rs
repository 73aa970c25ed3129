//! Reparametrization of the target variable.
//!
//! The final forest splits on Poisson deviance, which needs non-negative
//! targets. A transform is chosen once from the training target and its
//! parameters are frozen for the lifetime of the model, so predictions can
//! always be mapped back to the original scale.

use crate::error::{CodarfeError, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Coefficient of variation above which the sqrt-rescale transform is used.
pub const HIGH_VARIATION_CV: f64 = 0.2;

/// Upper end of the sqrt-rescale output range (the lower end is zero).
pub const RESCALE_MAX: f64 = 100.0;

/// Transform applied to the target before model fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetTransform {
    /// Target used as-is.
    Identity,
    /// `x + |min| + 1`, with `min` observed at fit time.
    Shift { min: f64 },
    /// Signed square root, then min-max rescale to `[0, 100]` using the
    /// bounds of the signed square root observed at fit time.
    SqrtRescale { min: f64, max: f64 },
}

impl TargetTransform {
    /// Choose the transform for a training target.
    ///
    /// Sqrt-rescale wins when `allow_high_variation` is set and
    /// `std / mean > 0.2`; otherwise a shift is used if any value is
    /// negative; otherwise the identity.
    pub fn decide(target: &[f64], allow_high_variation: bool) -> Result<Self> {
        if target.is_empty() {
            return Err(CodarfeError::EmptyData("Target is empty".to_string()));
        }
        if target.iter().any(|v| !v.is_finite()) {
            return Err(CodarfeError::Numerical(
                "Target contains non-finite values".to_string(),
            ));
        }

        let n = target.len() as f64;
        let mean = target.iter().sum::<f64>() / n;
        let std = (target.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let cv = std / mean;

        if allow_high_variation && cv > HIGH_VARIATION_CV {
            let roots: Vec<f64> = target.iter().map(|&v| signed_sqrt(v)).collect();
            let (min, max) = bounds(&roots);
            if max <= min {
                return Err(CodarfeError::Numerical(
                    "Cannot rescale a constant target".to_string(),
                ));
            }
            return Ok(Self::SqrtRescale { min, max });
        }

        let (min, _) = bounds(target);
        if min < 0.0 {
            info!(
                "The target was shifted {} + 1 units due to negative values not supported by the Poisson criterion",
                min.abs()
            );
            return Ok(Self::Shift { min });
        }

        Ok(Self::Identity)
    }

    pub fn is_sqrt(&self) -> bool {
        matches!(self, Self::SqrtRescale { .. })
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, Self::Shift { .. })
    }

    /// Map one original-scale value to model scale.
    pub fn forward_one(&self, value: f64) -> f64 {
        match *self {
            Self::Identity => value,
            Self::Shift { min } => value + min.abs() + 1.0,
            Self::SqrtRescale { min, max } => (signed_sqrt(value) - min) / (max - min) * RESCALE_MAX,
        }
    }

    /// Map one model-scale value back to the original scale.
    pub fn inverse_one(&self, value: f64) -> f64 {
        let mut out = value;
        if let Self::SqrtRescale { min, max } = *self {
            let root = out / RESCALE_MAX * (max - min) + min;
            out = root * root * root.signum();
        }
        if let Self::Shift { min } = *self {
            out -= min.abs() + 1.0;
        }
        out
    }

    pub fn forward(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.forward_one(v)).collect()
    }

    pub fn inverse(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.inverse_one(v)).collect()
    }
}

fn signed_sqrt(value: f64) -> f64 {
    value.abs().sqrt() * if value < 0.0 { -1.0 } else { 1.0 }
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_for_low_variation() {
        let target = vec![10.0, 10.5, 11.0, 9.5, 10.2];
        let transform = TargetTransform::decide(&target, true).unwrap();
        assert_eq!(transform, TargetTransform::Identity);
        assert_eq!(transform.forward(&target), target);
    }

    #[test]
    fn test_shift_for_negative_values() {
        let target = vec![-3.0, -2.5, -2.8, -3.1];
        let transform = TargetTransform::decide(&target, true).unwrap();
        assert_eq!(transform, TargetTransform::Shift { min: -3.1 });

        let forward = transform.forward(&target);
        assert!(forward.iter().all(|&v| v >= 1.0));
        assert_relative_eq!(forward[3], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shift_when_high_variation_not_allowed() {
        let target = vec![-10.0, 0.0, 50.0, 100.0];
        let transform = TargetTransform::decide(&target, false).unwrap();
        assert!(transform.is_shift());
    }

    #[test]
    fn test_sqrt_for_high_variation() {
        let target = vec![1.0, 4.0, 100.0, 400.0, 25.0];
        let transform = TargetTransform::decide(&target, true).unwrap();
        assert_eq!(transform, TargetTransform::SqrtRescale { min: 1.0, max: 20.0 });

        let forward = transform.forward(&target);
        assert_relative_eq!(forward[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(forward[3], 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip_all_modes() {
        let samples = [
            vec![10.0, 10.5, 11.0, 9.5, 10.2],
            vec![-3.0, -2.5, -2.8, -3.1],
            vec![-4.0, 1.0, 4.0, 100.0, 400.0, 25.0],
        ];
        for target in samples.iter() {
            let transform = TargetTransform::decide(target, true).unwrap();
            let restored = transform.inverse(&transform.forward(target));
            for (a, b) in restored.iter().zip(target) {
                assert_relative_eq!(*a, *b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_bounds_frozen_at_fit_time() {
        let train = vec![1.0, 4.0, 100.0, 400.0];
        let transform = TargetTransform::decide(&train, true).unwrap();

        // Values outside the training range still invert with the fit-time bounds.
        let later = vec![900.0, 0.25];
        let forward = transform.forward(&later);
        assert!(forward[0] > RESCALE_MAX);
        let restored = transform.inverse(&forward);
        assert_relative_eq!(restored[0], 900.0, epsilon = 1e-9);
        assert_relative_eq!(restored[1], 0.25, epsilon = 1e-9);
        assert_eq!(transform, TargetTransform::SqrtRescale { min: 1.0, max: 20.0 });
    }

    #[test]
    fn test_rejects_empty_and_nan() {
        assert!(TargetTransform::decide(&[], true).is_err());
        assert!(TargetTransform::decide(&[1.0, f64::NAN], true).is_err());
    }
}
