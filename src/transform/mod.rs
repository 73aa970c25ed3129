//! Target-variable transforms.

pub mod target;

pub use target::{TargetTransform, HIGH_VARIATION_CV, RESCALE_MAX};
