//! Prediction on new samples with imputation of missing taxa.

use super::fit::FittedModel;
use crate::data::CountTable;
use crate::error::{CodarfeError, Result};
use crate::impute::Resolution;
use crate::normalize::{clr_matrix, relative_abundance_matrix};
use log::{debug, warn};
use nalgebra::DMatrix;
use std::path::Path;

/// Share of selected taxa that must be unresolved for a prediction to be refused.
pub const MAX_NOT_FOUND_FRACTION: f64 = 0.75;

/// Output of [`FittedModel::predict`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Sample identifiers of the new table, in input order.
    pub sample_ids: Vec<String>,
    /// One value per sample on the original target scale; `None` when
    /// too few selected taxa could be resolved.
    pub values: Option<Vec<f64>>,
    /// Selected taxa that had neither a direct match nor a substitute.
    pub n_not_found: usize,
    /// Names of those taxa.
    pub missing_taxa: Vec<String>,
}

impl Prediction {
    pub fn is_refused(&self) -> bool {
        self.values.is_none()
    }

    /// Write `sample_id,Prediction` rows as CSV.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let values = self.values.as_ref().ok_or_else(|| {
            CodarfeError::EmptyData("The prediction was refused; nothing to write".to_string())
        })?;

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["sample_id", "Prediction"])?;
        for (id, value) in self.sample_ids.iter().zip(values) {
            let formatted = value.to_string();
            writer.write_record([id.as_str(), formatted.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl FittedModel {
    /// Predict the target for new samples.
    ///
    /// Each selected taxon is read from the new table directly, else from its
    /// best-correlated substitute that is present, else set to zero. When at
    /// least 75% of the selected taxa end up as zero the prediction is
    /// refused. Otherwise NaN cells become zero, rows are optionally converted
    /// to relative abundance, CLR-transformed, passed to the forest, and the
    /// outputs mapped back through the target transform.
    pub fn predict(&self, new: &CountTable, apply_relative_abundance: bool) -> Result<Prediction> {
        new.validate_counts()?;
        let imputer = self.imputer()?;
        let selected = self.selected_taxa();
        let n_samples = new.n_samples();

        let mut x = DMatrix::zeros(n_samples, selected.len());
        let mut missing_taxa = Vec::new();
        for (j, taxon) in selected.iter().enumerate() {
            let column = match imputer.resolve(taxon, new) {
                Resolution::Direct(column) => column,
                Resolution::Substitute { taxon: sub, column } => {
                    debug!("Taxon {} replaced by correlated taxon {}", taxon, sub);
                    column
                }
                Resolution::NotFound => {
                    warn!(
                        "Taxon {} was not found and has no correlated substitute; this may affect accuracy",
                        taxon
                    );
                    missing_taxa.push(taxon.clone());
                    continue;
                }
            };
            x.set_column(j, &new.matrix().column(column));
        }

        let n_not_found = missing_taxa.len();
        if n_not_found as f64 >= selected.len() as f64 * MAX_NOT_FOUND_FRACTION {
            warn!(
                "The new samples contain less than 25% of the selected taxa ({} of {} missing); no prediction made",
                n_not_found,
                selected.len()
            );
            return Ok(Prediction {
                sample_ids: new.sample_ids().to_vec(),
                values: None,
                n_not_found,
                missing_taxa,
            });
        }

        x.apply(|v| {
            if v.is_nan() {
                *v = 0.0;
            }
        });
        if apply_relative_abundance {
            x = relative_abundance_matrix(&x);
        }
        let raw = self.forest.predict(&clr_matrix(&x))?;

        Ok(Prediction {
            sample_ids: new.sample_ids().to_vec(),
            values: Some(self.transform.inverse(&raw)),
            n_not_found,
            missing_taxa,
        })
    }
}
