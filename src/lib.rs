//! CODARFE: compositional-data-aware recursive feature elimination.
//!
//! Selects a small set of microbiome taxa that predict a continuous
//! environmental variable, trains a regressor on them, and predicts the
//! variable for new samples even when some selected taxa are missing.
//!
//! # Overview
//!
//! - **data**: Count tables, targets and sample alignment
//! - **normalize**: Relative abundance and centered log-ratio transforms
//! - **filter**: Low-variance taxon removal
//! - **transform**: Target reparametrization for the Poisson criterion
//! - **model**: Huber regression, Poisson regression trees and forests
//! - **stats**: Fit metrics, cross-validation, correlation
//! - **select**: Recursive feature elimination and round scoring
//! - **impute**: Correlated substitutes for missing taxa
//! - **ordination**: Correspondence analysis
//! - **pipeline**: Fitting, prediction, diagnostics and persistence
//!
//! # Example
//!
//! ```no_run
//! use codarfe::prelude::*;
//!
//! let counts = CountTable::from_tsv("counts.tsv").unwrap();
//! let target = Target::from_tsv("metadata.tsv", "pH").unwrap();
//!
//! let model = fit(&counts, &target, &FitConfig::default()).unwrap();
//! println!("{} taxa selected", model.selected_taxa().len());
//!
//! let new = CountTable::from_tsv("new_samples.tsv").unwrap();
//! let prediction = model.predict(&new, true).unwrap();
//! if let Some(values) = prediction.values {
//!     println!("{:?}", values);
//! }
//! ```

pub mod data;
pub mod error;
pub mod filter;
pub mod impute;
pub mod model;
pub mod normalize;
pub mod ordination;
pub mod pipeline;
pub mod select;
pub mod stats;
pub mod transform;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{align, CountTable, Target};
    pub use crate::error::{CodarfeError, Result};
    pub use crate::filter::{remove_low_variance, VarianceFilterResult};
    pub use crate::impute::{CorrelationImputer, Substitute};
    pub use crate::model::{ForestConfig, HuberFit, HuberRegressor, RandomForest};
    pub use crate::normalize::{to_clr, to_relative_abundance};
    pub use crate::pipeline::{
        fit, FitConfig, FitWarning, FittedModel, HeatmapData, HoldoutValidation, Prediction,
        RelevantPredictor, TrainingCorrelation,
    };
    pub use crate::select::{RoundRecord, ScoreWeights, SelectionResults};
    pub use crate::transform::TargetTransform;
}
