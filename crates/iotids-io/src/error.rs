//! I/O error types for iotids-io.

use std::path::PathBuf;

/// Errors from table loading, table manipulation and result serialization.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of cells than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} cells, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Number of header columns.
        expected: usize,
        /// Number of cells in this row.
        got: usize,
    },

    /// Returned when two columns share a name.
    #[error("duplicate column \"{name}\"")]
    DuplicateColumn {
        /// The repeated column name.
        name: String,
    },

    /// Returned when a required column is absent from the table.
    #[error("missing column \"{name}\"")]
    MissingColumn {
        /// The column that was looked up.
        name: String,
    },

    /// Returned when a column's length differs from the table's row count.
    #[error("column \"{name}\" has {got} rows, expected {expected}")]
    ColumnLengthMismatch {
        /// The offending column.
        name: String,
        /// Row count of the table.
        expected: usize,
        /// Row count of the column.
        got: usize,
    },

    /// Returned when a row index is outside the table.
    #[error("row {row} is out of range for a table with {n_rows} rows")]
    RowOutOfRange {
        /// The offending row index.
        row: usize,
        /// Number of rows in the table.
        n_rows: usize,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact cannot be encoded as JSON.
    #[error("cannot serialize {path}")]
    SerializeJson {
        /// Artifact path being produced.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
