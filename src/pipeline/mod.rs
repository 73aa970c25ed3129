//! The CODARFE workflow: configure, fit, predict, inspect and persist.

mod config;
mod diagnostics;
mod fit;
mod persist;
mod predict;

pub use config::FitConfig;
pub use diagnostics::{
    HeatmapData, HoldoutValidation, RelevantPredictor, TrainingCorrelation, HEATMAP_OFFSET,
};
pub use fit::{fit, FitWarning, FittedModel, SIGNIFICANCE_WARNING_PVALUE};
pub use persist::ModelBundle;
pub use predict::{Prediction, MAX_NOT_FOUND_FRACTION};
