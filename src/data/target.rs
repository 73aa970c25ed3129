//! Target variable handling and sample alignment.

use super::count_table::{parse_cell, CountTable};
use crate::error::{CodarfeError, Result};
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// A continuous target value per sample identifier.
///
/// Missing values are stored as NaN and dropped by [`align`].
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    sample_ids: Vec<String>,
    values: Vec<f64>,
}

impl Target {
    /// Create a target from parallel vectors.
    pub fn new(sample_ids: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if sample_ids.len() != values.len() {
            return Err(CodarfeError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: values.len(),
            });
        }
        Ok(Self { sample_ids, values })
    }

    /// Read one column of a delimited metadata file.
    ///
    /// The first column holds the sample identifiers.
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: u8, column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        let col_idx = header
            .iter()
            .skip(1)
            .position(|h| h.trim() == column)
            .map(|p| p + 1)
            .ok_or_else(|| CodarfeError::MissingColumn(column.to_string()))?;

        let mut sample_ids = Vec::new();
        let mut values = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let Some(id) = record.get(0) else { continue };
            let value = match record.get(col_idx) {
                Some(raw) => parse_cell(raw, row_idx, col_idx)?,
                None => f64::NAN,
            };
            sample_ids.push(id.trim().to_string());
            values.push(value);
        }

        if sample_ids.is_empty() {
            return Err(CodarfeError::EmptyData("No samples in metadata".to_string()));
        }
        Self::new(sample_ids, values)
    }

    /// Read a tab-separated metadata file.
    pub fn from_tsv<P: AsRef<Path>>(path: P, column: &str) -> Result<Self> {
        Self::from_delimited(path, b'\t', column)
    }

    /// Read a comma-separated metadata file.
    pub fn from_csv<P: AsRef<Path>>(path: P, column: &str) -> Result<Self> {
        Self::from_delimited(path, b',', column)
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Align a count table with a target by sample identifier.
///
/// Samples with a missing target are dropped first. The remaining
/// identifiers are intersected with the table, keeping the target's order.
pub fn align(table: &CountTable, target: &Target) -> Result<(CountTable, Vec<f64>)> {
    let row_of: HashMap<&str, usize> = table
        .sample_ids()
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let total = target.len();
    let mut n_with_target = 0;
    let mut rows = Vec::new();
    let mut values = Vec::new();
    for (id, &value) in target.sample_ids().iter().zip(target.values()) {
        if value.is_nan() {
            continue;
        }
        n_with_target += 1;
        if let Some(&row) = row_of.get(id.as_str()) {
            rows.push(row);
            values.push(value);
        }
    }

    if rows.is_empty() {
        return Err(CodarfeError::NoOverlappingSamples);
    }
    info!(
        "Total samples with the target variable: {}/{} ({} matched the count table)",
        n_with_target,
        total,
        rows.len()
    );

    let aligned = table.subset_samples(&rows)?;
    Ok((aligned, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_table() -> CountTable {
        CountTable::from_rows(
            &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            vec!["S1".into(), "S2".into(), "S3".into()],
            vec!["a".into(), "b".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_from_tsv_reads_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tph\ttemperature").unwrap();
        writeln!(file, "S1\t6.5\t20").unwrap();
        writeln!(file, "S2\t\t21").unwrap();
        file.flush().unwrap();

        let target = Target::from_tsv(file.path(), "ph").unwrap();
        assert_eq!(target.sample_ids(), &["S1", "S2"]);
        assert_eq!(target.values()[0], 6.5);
        assert!(target.values()[1].is_nan());
    }

    #[test]
    fn test_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id,ph").unwrap();
        writeln!(file, "S1,6.5").unwrap();
        file.flush().unwrap();

        let result = Target::from_csv(file.path(), "salinity");
        assert!(matches!(result, Err(CodarfeError::MissingColumn(_))));
    }

    #[test]
    fn test_align_intersects_and_drops_missing() {
        let table = create_table();
        let target = Target::new(
            vec!["S3".into(), "S9".into(), "S1".into(), "S2".into()],
            vec![30.0, 90.0, 10.0, f64::NAN],
        )
        .unwrap();

        let (aligned, y) = align(&table, &target).unwrap();
        assert_eq!(aligned.sample_ids(), &["S3", "S1"]);
        assert_eq!(y, vec![30.0, 10.0]);
        assert_eq!(aligned.get(0, 0), 5.0);
    }

    #[test]
    fn test_align_no_overlap() {
        let table = create_table();
        let target = Target::new(vec!["X".into()], vec![1.0]).unwrap();
        assert!(matches!(
            align(&table, &target),
            Err(CodarfeError::NoOverlappingSamples)
        ));
    }
}
