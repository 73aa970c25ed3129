//! Imputation of selected taxa missing from new samples.

pub mod correlation;

pub use correlation::{CorrelationImputer, Resolution, Substitute, CORRELATION_THRESHOLD};
