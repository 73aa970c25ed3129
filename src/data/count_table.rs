//! Dense count table of samples × taxa.

use crate::error::{CodarfeError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A dense abundance table.
///
/// Rows are samples, columns are taxa. Values are non-negative counts or
/// abundances; missing cells read from disk are stored as NaN until they are
/// filled.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    /// Dense matrix (samples × taxa).
    data: DMatrix<f64>,
    /// Sample identifiers (row names).
    sample_ids: Vec<String>,
    /// Taxon names (column names).
    taxa: Vec<String>,
    /// Column lookup by taxon name.
    taxon_index: HashMap<String, usize>,
}

impl CountTable {
    /// Create a new CountTable from a dense matrix and identifiers.
    ///
    /// Cells must be non-negative and finite. NaN marks a missing cell.
    pub fn new(data: DMatrix<f64>, sample_ids: Vec<String>, taxa: Vec<String>) -> Result<Self> {
        check_counts(&data)?;
        Self::from_parts(data, sample_ids, taxa)
    }

    /// Build the table and its lookups without checking cell values.
    fn from_parts(data: DMatrix<f64>, sample_ids: Vec<String>, taxa: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != sample_ids.len() {
            return Err(CodarfeError::DimensionMismatch {
                expected: nrows,
                actual: sample_ids.len(),
            });
        }
        if ncols != taxa.len() {
            return Err(CodarfeError::DimensionMismatch {
                expected: ncols,
                actual: taxa.len(),
            });
        }

        let mut seen = HashSet::with_capacity(sample_ids.len());
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(CodarfeError::DuplicateSample(id.clone()));
            }
        }

        let mut taxon_index = HashMap::with_capacity(taxa.len());
        for (j, name) in taxa.iter().enumerate() {
            if taxon_index.insert(name.clone(), j).is_some() {
                return Err(CodarfeError::InvalidParameter(format!(
                    "Duplicate taxon name '{}'",
                    name
                )));
            }
        }

        Ok(Self {
            data,
            sample_ids,
            taxa,
            taxon_index,
        })
    }

    /// Build a table from row-major values.
    pub fn from_rows(rows: &[Vec<f64>], sample_ids: Vec<String>, taxa: Vec<String>) -> Result<Self> {
        let n_taxa = taxa.len();
        for row in rows {
            if row.len() != n_taxa {
                return Err(CodarfeError::DimensionMismatch {
                    expected: n_taxa,
                    actual: row.len(),
                });
            }
        }
        let data = DMatrix::from_fn(rows.len(), n_taxa, |i, j| rows[i][j]);
        Self::new(data, sample_ids, taxa)
    }

    /// Load a table from a delimited text file.
    ///
    /// The first row is a header of taxon names (its first cell names the
    /// identifier column); each following row starts with the sample
    /// identifier. Empty cells and `NA`/`nan` become NaN.
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(CodarfeError::EmptyData(
                "Table must have at least one taxon column".to_string(),
            ));
        }
        let taxa: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();

        let mut sample_ids = Vec::new();
        let mut rows = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let mut fields = record.iter();
            let sample_id = match fields.next() {
                Some(id) => id.trim().to_string(),
                None => continue,
            };
            let values = fields
                .enumerate()
                .map(|(col_idx, raw)| parse_cell(raw, row_idx, col_idx))
                .collect::<Result<Vec<f64>>>()?;
            sample_ids.push(sample_id);
            rows.push(values);
        }

        if rows.is_empty() {
            return Err(CodarfeError::EmptyData("No samples in table".to_string()));
        }

        Self::from_rows(&rows, sample_ids, taxa)
    }

    /// Load a tab-separated table.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b'\t')
    }

    /// Load a comma-separated table.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b',')
    }

    /// Get the value at (sample, taxon).
    #[inline]
    pub fn get(&self, sample: usize, taxon: usize) -> f64 {
        self.data[(sample, taxon)]
    }

    /// Number of samples (rows).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of taxa (columns).
    #[inline]
    pub fn n_taxa(&self) -> usize {
        self.data.ncols()
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Taxon names.
    #[inline]
    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    /// Underlying dense matrix.
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Column index of a taxon.
    pub fn taxon_position(&self, name: &str) -> Option<usize> {
        self.taxon_index.get(name).copied()
    }

    /// Whether the table has a column for `name`.
    pub fn contains_taxon(&self, name: &str) -> bool {
        self.taxon_index.contains_key(name)
    }

    /// Dense copy of one taxon column.
    pub fn column(&self, taxon: usize) -> Vec<f64> {
        self.data.column(taxon).iter().copied().collect()
    }

    /// Dense copy of one sample row.
    pub fn row(&self, sample: usize) -> Vec<f64> {
        self.data.row(sample).iter().copied().collect()
    }

    /// Replace the values while keeping identifiers.
    pub fn with_data(&self, data: DMatrix<f64>) -> Result<Self> {
        if data.shape() != self.data.shape() {
            return Err(CodarfeError::DimensionMismatch {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            sample_ids: self.sample_ids.clone(),
            taxa: self.taxa.clone(),
            taxon_index: self.taxon_index.clone(),
        })
    }

    /// Subset the table to the given taxon columns, in the given order.
    pub fn subset_taxa(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&j| j >= self.n_taxa()) {
            return Err(CodarfeError::InvalidParameter(format!(
                "Taxon index {} out of bounds",
                bad
            )));
        }
        let data = self.data.select_columns(indices);
        let taxa = indices.iter().map(|&j| self.taxa[j].clone()).collect();
        Self::from_parts(data, self.sample_ids.clone(), taxa)
    }

    /// Subset the table to the named taxa, in the given order.
    pub fn select_taxa<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|name| {
                self.taxon_position(name.as_ref()).ok_or_else(|| {
                    CodarfeError::InvalidParameter(format!(
                        "Taxon '{}' not in table",
                        name.as_ref()
                    ))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        self.subset_taxa(&indices)
    }

    /// Subset the table to the given sample rows, in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(CodarfeError::InvalidParameter(format!(
                "Sample index {} out of bounds",
                bad
            )));
        }
        let data = self.data.select_rows(indices);
        let sample_ids = indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        Self::from_parts(data, sample_ids, self.taxa.clone())
    }

    /// Check that every cell is a non-negative count or NaN.
    ///
    /// Tables produced by [`with_data`](Self::with_data) (for example CLR
    /// values) skip this check on construction.
    pub fn validate_counts(&self) -> Result<()> {
        check_counts(&self.data)
    }

    /// Replace NaN cells with `value`.
    pub fn fill_nan(&self, value: f64) -> Self {
        let data = self.data.map(|x| if x.is_nan() { value } else { x });
        Self {
            data,
            sample_ids: self.sample_ids.clone(),
            taxa: self.taxa.clone(),
            taxon_index: self.taxon_index.clone(),
        }
    }

    /// Serializable snapshot of the table.
    pub fn to_record(&self) -> TableRecord {
        TableRecord {
            sample_ids: self.sample_ids.clone(),
            taxa: self.taxa.clone(),
            rows: (0..self.n_samples()).map(|i| self.row(i)).collect(),
        }
    }

    /// Rebuild a table from its snapshot.
    pub fn from_record(record: TableRecord) -> Result<Self> {
        Self::from_rows(&record.rows, record.sample_ids, record.taxa)
    }
}

/// Row-major, serializable form of a [`CountTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub sample_ids: Vec<String>,
    pub taxa: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

/// Reject negative and infinite cells; NaN passes as missing.
fn check_counts(data: &DMatrix<f64>) -> Result<()> {
    for j in 0..data.ncols() {
        for i in 0..data.nrows() {
            let value = data[(i, j)];
            if value < 0.0 || value.is_infinite() {
                return Err(CodarfeError::InvalidValue {
                    value: value.to_string(),
                    row: i,
                    col: j,
                });
            }
        }
    }
    Ok(())
}

pub(crate) fn parse_cell(raw: &str, row: usize, col: usize) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    let invalid = || CodarfeError::InvalidValue {
        value: raw.to_string(),
        row,
        col,
    };
    let value = trimmed.parse::<f64>().map_err(|_| invalid())?;
    if value < 0.0 || value.is_infinite() {
        return Err(invalid());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_table() -> CountTable {
        // 4 samples × 3 taxa
        CountTable::from_rows(
            &[
                vec![10.0, 100.0, 1.0],
                vec![20.0, 200.0, 0.0],
                vec![0.0, 150.0, 0.0],
                vec![5.0, 175.0, 0.0],
            ],
            vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()],
            vec!["taxon_A".into(), "taxon_B".into(), "taxon_C".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let table = create_test_table();
        assert_eq!(table.n_samples(), 4);
        assert_eq!(table.n_taxa(), 3);
        assert_eq!(table.get(1, 1), 200.0);
    }

    #[test]
    fn test_rejects_duplicate_samples() {
        let result = CountTable::from_rows(
            &[vec![1.0], vec![2.0]],
            vec!["S1".into(), "S1".into()],
            vec!["t".into()],
        );
        assert!(matches!(result, Err(CodarfeError::DuplicateSample(_))));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = CountTable::from_rows(
            &[vec![1.0, 2.0], vec![2.0]],
            vec!["S1".into(), "S2".into()],
            vec!["a".into(), "b".into()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_select_taxa_keeps_order() {
        let table = create_test_table();
        let subset = table.select_taxa(&["taxon_C", "taxon_A"]).unwrap();
        assert_eq!(subset.taxa(), &["taxon_C", "taxon_A"]);
        assert_eq!(subset.get(0, 0), 1.0);
        assert_eq!(subset.get(0, 1), 10.0);
        assert!(table.select_taxa(&["missing"]).is_err());
    }

    #[test]
    fn test_subset_samples() {
        let table = create_test_table();
        let subset = table.subset_samples(&[3, 1]).unwrap();
        assert_eq!(subset.sample_ids(), &["S4", "S2"]);
        assert_eq!(subset.get(0, 0), 5.0);
    }

    #[test]
    fn test_from_tsv_with_missing_cells() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample\tA\tB").unwrap();
        writeln!(file, "S1\t1\t2").unwrap();
        writeln!(file, "S2\t\tNA").unwrap();
        file.flush().unwrap();

        let table = CountTable::from_tsv(file.path()).unwrap();
        assert_eq!(table.taxa(), &["A", "B"]);
        assert_eq!(table.get(0, 1), 2.0);
        assert!(table.get(1, 0).is_nan());

        let filled = table.fill_nan(0.0);
        assert_eq!(filled.get(1, 0), 0.0);
        assert_eq!(filled.get(1, 1), 0.0);
    }

    #[test]
    fn test_from_csv_rejects_text() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample,A").unwrap();
        writeln!(file, "S1,abc").unwrap();
        file.flush().unwrap();

        let result = CountTable::from_csv(file.path());
        assert!(matches!(result, Err(CodarfeError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_negative_and_infinite_cells() {
        let names = || vec!["S1".to_string(), "S2".to_string()];
        let taxa = || vec!["a".to_string(), "b".to_string()];

        let negative = CountTable::from_rows(&[vec![1.0, 2.0], vec![-5.0, 3.0]], names(), taxa());
        assert!(matches!(
            negative,
            Err(CodarfeError::InvalidValue { row: 1, col: 0, .. })
        ));

        let infinite = CountTable::from_rows(&[vec![1.0, f64::INFINITY], vec![0.0, 3.0]], names(), taxa());
        assert!(matches!(infinite, Err(CodarfeError::InvalidValue { .. })));

        let missing = CountTable::from_rows(&[vec![1.0, f64::NAN], vec![0.0, 3.0]], names(), taxa());
        assert!(missing.is_ok());
    }

    #[test]
    fn test_from_csv_rejects_negative_count() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample,A,B").unwrap();
        writeln!(file, "S1,4,2").unwrap();
        writeln!(file, "S2,-5,1").unwrap();
        file.flush().unwrap();

        let result = CountTable::from_csv(file.path());
        assert!(matches!(
            result,
            Err(CodarfeError::InvalidValue { row: 1, col: 0, .. })
        ));
    }

    #[test]
    fn test_record_roundtrip() {
        let table = create_test_table();
        let restored = CountTable::from_record(table.to_record()).unwrap();
        assert_eq!(restored, table);
    }
}
