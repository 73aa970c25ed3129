//! Model fitting: search, selection and the final forest.

use super::config::FitConfig;
use crate::data::{align, CountTable, Target};
use crate::error::{CodarfeError, Result};
use crate::filter::remove_low_variance;
use crate::impute::{CorrelationImputer, CORRELATION_THRESHOLD};
use crate::model::RandomForest;
use crate::normalize::{clr_matrix, to_relative_abundance};
use crate::select::{run_rfe, score_and_select, SelectionResults};
use crate::transform::TargetTransform;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;

/// F-test p-value above which the selection is reported as not significant.
pub const SIGNIFICANCE_WARNING_PVALUE: f64 = 0.5;

/// Advisory conditions of a fit that still produced a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FitWarning {
    /// Adjusted R² of the selection is outside `(0, 1]`.
    PoorGeneralization { r2_adj: f64 },
    /// F-test p-value of the selection is above 0.5.
    NotSignificant { f_pvalue: f64 },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::PoorGeneralization { r2_adj } => write!(
                f,
                "The model has poor generalization power (adjusted R² = {}); check the results before using it for prediction",
                r2_adj
            ),
            FitWarning::NotSignificant { f_pvalue } => write!(
                f,
                "The selected features are not statistically significant (F-test p-value = {})",
                f_pvalue
            ),
        }
    }
}

/// A fitted CODARFE model.
///
/// Produced only by [`fit`] or [`FittedModel::load`](FittedModel::load) and
/// never mutated afterwards, except for the correlation imputer that is
/// built on the first prediction that needs it.
#[derive(Debug)]
pub struct FittedModel {
    pub(crate) training: CountTable,
    pub(crate) target: Vec<f64>,
    pub(crate) transform: TargetTransform,
    pub(crate) results: SelectionResults,
    pub(crate) forest: RandomForest,
    pub(crate) config: FitConfig,
    pub(crate) n_input_taxa: usize,
    pub(crate) warnings: Vec<FitWarning>,
    pub(crate) imputer: OnceLock<CorrelationImputer>,
}

/// Fit a model on a count table and a target.
///
/// Steps, in order: validate the configuration, align samples, optionally
/// drop low-variance taxa and convert to relative abundance, decide the
/// target transform, run the elimination search on the transformed target,
/// select the best round, then train the forest on the CLR of the selected
/// taxa. Missing counts are read as zero.
pub fn fit(table: &CountTable, target: &Target, config: &FitConfig) -> Result<FittedModel> {
    config.validate()?;

    let (aligned, y) = align(table, target)?;
    aligned.validate_counts()?;
    if config.cv_folds > aligned.n_samples() {
        return Err(CodarfeError::InvalidParameter(format!(
            "cv_folds ({}) exceeds the number of aligned samples ({})",
            config.cv_folds,
            aligned.n_samples()
        )));
    }
    let n_input_taxa = aligned.n_taxa();
    let mut training = aligned.fill_nan(0.0);

    if config.remove_low_variance_features {
        let filtered = remove_low_variance(&training)?;
        training = filtered.table;
    }
    if config.apply_relative_abundance {
        training = to_relative_abundance(&training)?;
    }

    let transform = TargetTransform::decide(&y, config.allow_target_transform_on_high_variance)?;
    let y_model = transform.forward(&y);

    let records = run_rfe(&training, &y_model, &config.rfe_config())?;
    let results = match score_and_select(&records, &config.score_weights()) {
        Ok(results) => results,
        Err(CodarfeError::NoUsableRounds) => {
            warn!("The model was not able to generalize the data; check the data and re-run the training");
            return Err(CodarfeError::NoUsableRounds);
        }
        Err(e) => return Err(e),
    };

    let x = clr_matrix(training.select_taxa(&results.taxa)?.matrix());
    let forest = RandomForest::fit(&x, &y_model, &config.forest_config())?;

    let mut warnings = Vec::new();
    if results.r2_adj <= 0.0 || results.r2_adj > 1.0 {
        warnings.push(FitWarning::PoorGeneralization {
            r2_adj: results.r2_adj,
        });
    }
    if results.f_pvalue > SIGNIFICANCE_WARNING_PVALUE {
        warnings.push(FitWarning::NotSignificant {
            f_pvalue: results.f_pvalue,
        });
    }
    for w in &warnings {
        warn!("{}", w);
    }

    info!(
        "Model created: R2 adj {}, F p-value {}, BIC {}, RMSE-CV {}, {} selected taxa ({:.2}% of {})",
        results.r2_adj,
        results.f_pvalue,
        results.bic,
        results.rmse_cv,
        results.taxa.len(),
        results.taxa.len() as f64 / n_input_taxa as f64 * 100.0,
        n_input_taxa
    );

    Ok(FittedModel {
        training,
        target: y,
        transform,
        results,
        forest,
        config: config.clone(),
        n_input_taxa,
        warnings,
        imputer: OnceLock::new(),
    })
}

impl FittedModel {
    /// Selected taxa, in selection order.
    pub fn selected_taxa(&self) -> &[String] {
        &self.results.taxa
    }

    /// Raw metrics and composite score of the selected round.
    pub fn results(&self) -> &SelectionResults {
        &self.results
    }

    pub fn transform(&self) -> &TargetTransform {
        &self.transform
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    /// The training table after filtering and relative abundance.
    pub fn training_table(&self) -> &CountTable {
        &self.training
    }

    /// The aligned training target on its original scale.
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Number of taxa in the aligned input, before filtering.
    pub fn n_input_taxa(&self) -> usize {
        self.n_input_taxa
    }

    /// The correlation imputer, built on first use.
    pub fn imputer(&self) -> Result<&CorrelationImputer> {
        if let Some(imputer) = self.imputer.get() {
            return Ok(imputer);
        }
        info!("Creating the correlation list for imputation; this runs once per model");
        let built = CorrelationImputer::build(&self.training, self.selected_taxa(), CORRELATION_THRESHOLD)?;
        Ok(self.imputer.get_or_init(|| built))
    }

    /// CLR of the selected training columns, as seen by the forest.
    pub(crate) fn training_design(&self) -> Result<nalgebra::DMatrix<f64>> {
        Ok(clr_matrix(self.training.select_taxa(self.selected_taxa())?.matrix()))
    }

    /// Write a plain-text summary of the selection.
    pub fn write_report<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let r = &self.results;

        writeln!(writer, "Results: \n")?;
        writeln!(writer, "R² adj -> {}", r.r2_adj)?;
        writeln!(writer, "F-statistic -> {}", r.f_pvalue)?;
        writeln!(writer, "BIC -> {}", r.bic)?;
        writeln!(writer, "MSE-CV -> {}", r.rmse_cv)?;
        writeln!(
            writer,
            "Total selected predictors -> {}. This value corresponds to {}% of the total observed\n",
            r.taxa.len(),
            r.taxa.len() as f64 / self.n_input_taxa as f64 * 100.0
        )?;
        writeln!(writer, "Selected predictors: \n")?;
        write!(writer, "{}", r.taxa.join(","))?;
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::relative_abundance_matrix;
    use nalgebra::DMatrix;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::fs;
    use tempfile::NamedTempFile;

    fn small_problem() -> (CountTable, Target) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let counts = DMatrix::from_fn(24, 8, |_, _| rng.gen_range(5.0..100.0));
        let clr = clr_matrix(&relative_abundance_matrix(&counts));
        let values: Vec<f64> = (0..24).map(|i| 20.0 + 3.0 * clr[(i, 0)] + rng.gen_range(-0.2..0.2)).collect();
        let ids: Vec<String> = (0..24).map(|i| format!("s{}", i)).collect();

        let table = CountTable::new(counts, ids.clone(), (0..8).map(|j| format!("t{}", j)).collect()).unwrap();
        (table, Target::new(ids, values).unwrap())
    }

    fn quick_config() -> FitConfig {
        FitConfig::default()
            .with_low_variance_removal(false)
            .with_cv_folds(4)
            .with_fraction_removed(10)
            .with_n_trees(20)
    }

    #[test]
    fn test_fit_selects_signal() {
        let (table, target) = small_problem();
        let model = fit(&table, &target, &quick_config()).unwrap();

        assert!(model.selected_taxa().contains(&"t0".to_string()));
        assert!(model.results().r2_adj > 0.5);
        assert_eq!(model.forest().n_features(), model.selected_taxa().len());
        assert_eq!(model.n_input_taxa(), 8);
        assert_eq!(model.target().len(), 24);
    }

    #[test]
    fn test_invalid_config_fails_first() {
        let (table, target) = small_problem();
        let config = quick_config().with_cv_folds(1);
        assert!(matches!(
            fit(&table, &target, &config),
            Err(CodarfeError::InvalidParameter(_))
        ));

        let config = quick_config().with_cv_folds(50);
        assert!(matches!(
            fit(&table, &target, &config),
            Err(CodarfeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_no_overlap() {
        let (table, _) = small_problem();
        let other = Target::new(vec!["x".to_string(), "y".to_string()], vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            fit(&table, &other, &quick_config()),
            Err(CodarfeError::NoOverlappingSamples)
        ));
    }

    #[test]
    fn test_report_contents() {
        let (table, target) = small_problem();
        let model = fit(&table, &target, &quick_config()).unwrap();

        let file = NamedTempFile::new().unwrap();
        model.write_report(file.path()).unwrap();
        let text = fs::read_to_string(file.path()).unwrap();

        assert!(text.starts_with("Results: \n"));
        assert!(text.contains("R² adj -> "));
        assert!(text.contains(&format!("Total selected predictors -> {}.", model.selected_taxa().len())));
        assert!(text.ends_with(&model.selected_taxa().join(",")));
    }

    /// Two taxa whose log-ratio is mirrored within each pair of samples that
    /// share a target value, so the target carries no linear signal.
    fn mirrored_problem(levels: &[f64]) -> (CountTable, Target) {
        let mut rows = Vec::new();
        let mut values = Vec::new();
        for (k, &level) in levels.iter().enumerate() {
            let high = 10.0 * (k as f64 + 2.0);
            rows.push(vec![10.0, high]);
            rows.push(vec![high, 10.0]);
            values.extend([level, level]);
        }
        let ids: Vec<String> = (0..rows.len()).map(|i| format!("s{}", i)).collect();
        let table = CountTable::from_rows(&rows, ids.clone(), vec!["a".into(), "b".into()]).unwrap();
        (table, Target::new(ids, values).unwrap())
    }

    #[test]
    fn test_uninformative_target_reports_warnings() {
        let (table, target) = mirrored_problem(&[10.0, 12.0, 11.0, 13.0, 10.5, 12.5, 11.5, 9.5]);
        let model = fit(&table, &target, &quick_config()).unwrap();

        assert!(model.results().r2_adj < 0.0);
        assert!(model.results().f_pvalue > SIGNIFICANCE_WARNING_PVALUE);
        assert!(model
            .warnings()
            .iter()
            .any(|w| matches!(w, FitWarning::PoorGeneralization { .. })));
        assert!(model
            .warnings()
            .iter()
            .any(|w| matches!(w, FitWarning::NotSignificant { .. })));
    }

    #[test]
    fn test_constant_target_has_no_usable_rounds() {
        let (table, target) = mirrored_problem(&[5.0; 8]);
        assert!(matches!(
            fit(&table, &target, &quick_config()),
            Err(CodarfeError::NoUsableRounds)
        ));
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let (table, target) = small_problem();
        let mut counts = table.matrix().clone();
        counts[(0, 0)] = -5.0;
        let corrupted = table.with_data(counts).unwrap();

        assert!(matches!(
            fit(&corrupted, &target, &quick_config()),
            Err(CodarfeError::InvalidValue { row: 0, col: 0, .. })
        ));

        let clr = crate::normalize::to_clr(&table).unwrap();
        assert!(matches!(
            fit(&clr, &target, &quick_config()),
            Err(CodarfeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_warning_display() {
        let w = FitWarning::NotSignificant { f_pvalue: 0.7 };
        assert!(w.to_string().contains("0.7"));
    }
}
