//! Statistics for scoring feature sets.
//!
//! - **metrics**: R², adjusted R², F-test p-value, log-likelihood, BIC
//! - **cv**: seeded k-fold cross-validated RMSE
//! - **correlation**: Pearson correlation, single and pairwise

pub mod correlation;
pub mod cv;
pub mod metrics;

pub use correlation::{pairwise_correlation, pearson, pearson_test};
pub use cv::{cv_rmse, kfold_splits, Fold};
pub use metrics::{adjusted_r_squared, bic, centered_tss, f_pvalue, log_likelihood, r_squared, ssr};
