//! Substitutes for selected taxa that are absent from new samples.
//!
//! For every selected taxon the imputer keeps the other training taxa whose
//! CLR-space Pearson correlation with it is at least the threshold, best
//! first. At prediction time a missing taxon is replaced by the first of its
//! substitutes present in the new table.

use crate::data::CountTable;
use crate::error::{CodarfeError, Result};
use crate::normalize::clr_matrix;
use crate::stats::pairwise_correlation;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum correlation for a taxon to count as a substitute.
pub const CORRELATION_THRESHOLD: f64 = 0.7;

/// A candidate replacement and its correlation with the missing taxon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitute {
    pub taxon: String,
    pub correlation: f64,
}

/// Ranked substitutes for each selected taxon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationImputer {
    threshold: f64,
    substitutes: BTreeMap<String, Vec<Substitute>>,
}

/// Where the values of a selected taxon come from in a new table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The taxon itself is present.
    Direct(usize),
    /// A correlated taxon stands in for it.
    Substitute { taxon: &'a str, column: usize },
    /// Neither the taxon nor any substitute is present.
    NotFound,
}

impl CorrelationImputer {
    /// Build substitute lists for `selected` against every taxon of the
    /// training table.
    pub fn build<S: AsRef<str>>(
        training: &CountTable,
        selected: &[S],
        threshold: f64,
    ) -> Result<Self> {
        let columns: Vec<usize> = selected
            .iter()
            .map(|name| {
                training
                    .taxon_position(name.as_ref())
                    .ok_or_else(|| CodarfeError::MissingColumn(name.as_ref().to_string()))
            })
            .collect::<Result<_>>()?;

        let clr = clr_matrix(training.matrix());
        let corr = pairwise_correlation(&clr.select_columns(&columns), &clr)?;

        let substitutes = columns
            .par_iter()
            .enumerate()
            .map(|(i, &own)| {
                let mut list: Vec<Substitute> = (0..training.n_taxa())
                    .filter(|&j| j != own && corr[(i, j)] >= threshold)
                    .map(|j| Substitute {
                        taxon: training.taxa()[j].clone(),
                        correlation: corr[(i, j)],
                    })
                    .collect();
                list.sort_by(|a, b| b.correlation.total_cmp(&a.correlation));
                (training.taxa()[own].clone(), list)
            })
            .collect();

        Ok(Self {
            threshold,
            substitutes,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Substitutes of a selected taxon, best first. Empty for unknown taxa.
    pub fn substitutes(&self, taxon: &str) -> &[Substitute] {
        self.substitutes.get(taxon).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Locate the values to use for `taxon` in a new table.
    pub fn resolve<'a>(&'a self, taxon: &str, table: &CountTable) -> Resolution<'a> {
        if let Some(column) = table.taxon_position(taxon) {
            return Resolution::Direct(column);
        }
        self.substitutes(taxon)
            .iter()
            .find_map(|s| {
                table.taxon_position(&s.taxon).map(|column| Resolution::Substitute {
                    taxon: s.taxon.as_str(),
                    column,
                })
            })
            .unwrap_or(Resolution::NotFound)
    }
}
