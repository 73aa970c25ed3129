//! Regression models.
//!
//! - **Huber**: robust linear regression used inside the feature search
//! - **Forest**: Poisson-criterion random forest used for final predictions

pub mod forest;
pub mod huber;
pub mod tree;

pub use forest::{ForestConfig, RandomForest};
pub use huber::{HuberFit, HuberRegressor, HUBER_ALPHA, HUBER_EPSILON};
pub use tree::{RegressionTree, TreeConfig, TreeNode};
