use std::path::PathBuf;

use iotids_io::IoError;

/// Errors from categorical encoding, feature extraction and splitting.
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    /// Propagated table error (row selection, column replacement).
    #[error(transparent)]
    Table(#[from] IoError),

    /// Returned when a column named by the encoder or a `FeatureSpec` is absent.
    #[error("missing column \"{column}\"")]
    MissingColumn {
        /// The column that was looked up.
        column: String,
    },

    /// Returned when a cell that must be present is missing.
    #[error("missing value in column \"{column}\" at row {row}")]
    MissingValue {
        /// The column holding the missing cell.
        column: String,
        /// Zero-based row index within the table being processed.
        row: usize,
    },

    /// Returned when a value was not seen while fitting the encoder.
    #[error("unknown category \"{value}\" in column \"{column}\" at row {row}")]
    UnknownCategory {
        /// The encoded column.
        column: String,
        /// The unseen value.
        value: String,
        /// Zero-based row index within the table being transformed.
        row: usize,
    },

    /// Returned when the test fraction is not strictly between 0 and 1.
    #[error("test_fraction must be in (0.0, 1.0), got {fraction}")]
    InvalidTestFraction {
        /// The invalid fraction.
        fraction: f64,
    },

    /// Returned when the split leaves either partition empty.
    #[error("splitting {n_rows} rows gives {n_train} train and {n_test} test rows; both must be non-empty")]
    EmptyPartition {
        /// Rows being split.
        n_rows: usize,
        /// Rows assigned to train.
        n_train: usize,
        /// Rows assigned to test.
        n_test: usize,
    },

    /// Returned when the feature rows and the label vector disagree in length.
    #[error("{n_features_rows} feature rows but {n_labels} labels")]
    LengthMismatch {
        /// Number of feature rows.
        n_features_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when a feature or label column still holds text.
    #[error("column \"{column}\" is not numeric; encode it as categorical first")]
    NonNumericColumn {
        /// The offending column.
        column: String,
    },

    /// Returned when an encoded label is not a non-negative integer code.
    #[error("label column \"{column}\" holds {value} at row {row}, not a class code")]
    InvalidClassCode {
        /// The label column.
        column: String,
        /// The offending value.
        value: f64,
        /// Zero-based row index.
        row: usize,
    },

    /// Returned when the encoding table file cannot be read.
    #[error("cannot read encoding table {path}")]
    ReadEncoding {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the encoding table file is not valid JSON for this format.
    #[error("cannot parse encoding table {path}")]
    ParseEncoding {
        /// Path to the file.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when the encoding table cannot be encoded as JSON.
    #[error("cannot serialize encoding table")]
    SerializeEncoding {
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when the encoding table file cannot be written.
    #[error("cannot write encoding table {path}")]
    WriteEncoding {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
