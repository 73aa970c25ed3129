//! Saving and loading fitted models as JSON.

use super::config::FitConfig;
use super::fit::{FitWarning, FittedModel};
use crate::data::{CountTable, TableRecord};
use crate::error::Result;
use crate::impute::CorrelationImputer;
use crate::model::RandomForest;
use crate::select::SelectionResults;
use crate::transform::TargetTransform;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;

/// Everything needed to rebuild a [`FittedModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub training: TableRecord,
    pub target: Vec<f64>,
    pub transform: TargetTransform,
    pub results: SelectionResults,
    pub forest: RandomForest,
    pub max_huber_iterations: usize,
    pub config: FitConfig,
    pub n_input_taxa: usize,
    pub warnings: Vec<FitWarning>,
    /// Present when the imputer was built before saving.
    pub imputer: Option<CorrelationImputer>,
}

impl FittedModel {
    /// Snapshot of the model.
    pub fn to_bundle(&self) -> ModelBundle {
        ModelBundle {
            training: self.training.to_record(),
            target: self.target.clone(),
            transform: self.transform,
            results: self.results.clone(),
            forest: self.forest.clone(),
            max_huber_iterations: self.config.max_huber_iterations,
            config: self.config.clone(),
            n_input_taxa: self.n_input_taxa,
            warnings: self.warnings.clone(),
            imputer: self.imputer.get().cloned(),
        }
    }

    /// Rebuild a model from its snapshot.
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self> {
        let training = CountTable::from_record(bundle.training)?;
        let mut config = bundle.config;
        config.max_huber_iterations = bundle.max_huber_iterations;

        let imputer = bundle.imputer.map_or_else(OnceLock::new, OnceLock::from);

        Ok(Self {
            training,
            target: bundle.target,
            transform: bundle.transform,
            results: bundle.results,
            forest: bundle.forest,
            config,
            n_input_taxa: bundle.n_input_taxa,
            warnings: bundle.warnings,
            imputer,
        })
    }

    /// Write the model to a JSON file. The parent directory must exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &self.to_bundle())?;
        writer.flush()?;
        info!("Model saved at {}", path.display());
        Ok(())
    }

    /// Read a model written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let bundle: ModelBundle = serde_json::from_reader(reader)?;
        let model = Self::from_bundle(bundle)?;
        info!("Model restored from {}", path.display());
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Target;
    use crate::normalize::{clr_matrix, relative_abundance_matrix};
    use crate::pipeline::fit;
    use nalgebra::DMatrix;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use tempfile::tempdir;

    fn fitted() -> FittedModel {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let counts = DMatrix::from_fn(20, 6, |_, _| rng.gen_range(5.0..80.0));
        let clr = clr_matrix(&relative_abundance_matrix(&counts));
        let values: Vec<f64> = (0..20).map(|i| 30.0 + 2.0 * clr[(i, 1)] + rng.gen_range(-0.1..0.1)).collect();
        let ids: Vec<String> = (0..20).map(|i| format!("s{}", i)).collect();

        let table = CountTable::new(counts, ids.clone(), (0..6).map(|j| format!("t{}", j)).collect()).unwrap();
        let config = FitConfig::default()
            .with_low_variance_removal(false)
            .with_cv_folds(4)
            .with_n_trees(10);
        fit(&table, &Target::new(ids, values).unwrap(), &config).unwrap()
    }

    #[test]
    fn test_bundle_keeps_imputer_state() {
        let model = fitted();

        let lazy = FittedModel::from_bundle(model.to_bundle()).unwrap();
        assert!(lazy.to_bundle().imputer.is_none());

        let built = model.imputer().unwrap().clone();
        let restored = FittedModel::from_bundle(model.to_bundle()).unwrap();
        assert_eq!(restored.to_bundle().imputer, Some(built));
        assert_eq!(restored.selected_taxa(), model.selected_taxa());
    }

    #[test]
    fn test_save_and_load() {
        let model = fitted();
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        model.save(&path).unwrap();
        let loaded = FittedModel::load(&path).unwrap();
        assert_eq!(loaded.results(), model.results());
        assert_eq!(loaded.forest(), model.forest());
        assert!(FittedModel::load(dir.path().join("missing.json")).is_err());
    }
}
