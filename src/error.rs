//! Error types for the codarfe library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum CodarfeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate sample identifier '{0}'")]
    DuplicateSample(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("No overlapping sample identifiers between the count table and the metadata")]
    NoOverlappingSamples,

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("The search produced no usable rounds; the data could not be generalized")]
    NoUsableRounds,

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, CodarfeError>;
