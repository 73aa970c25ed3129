//! Filtering primitives for count tables.

pub mod variance;

pub use variance::{remove_low_variance, VarianceFilterResult, LOW_VARIANCE_DIVISOR};
