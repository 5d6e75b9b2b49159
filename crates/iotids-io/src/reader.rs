//! Delimited-text table reader with input validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::IoError;
use crate::domain::{Column, ColumnData, Table};

/// Cell spellings treated as missing, compared case-insensitively after trimming.
const MISSING_MARKERS: [&str; 3] = ["na", "nan", "null"];

/// Reads a delimited text file with a header row into a [`Table`].
///
/// - Blank header cells are named `unnamed_{i}` (zero-based position).
/// - Empty cells and `NA`/`NaN`/`null` (any case) are missing.
/// - A column is numeric when every non-missing cell parses as a finite
///   `f64`, unless it was listed in [`TableReader::with_text_columns`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed record |
/// | [`IoError::DuplicateColumn`] | Two header cells share a name |
/// | [`IoError::InconsistentRowLength`] | Row has a different cell count than the header |
/// | [`IoError::EmptyDataset`] | Zero data rows after the header |
pub struct TableReader {
    path: PathBuf,
    delimiter: u8,
    text_columns: Vec<String>,
}

impl TableReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: b',',
            text_columns: Vec::new(),
        }
    }

    /// Field separator, `,` by default.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Keep these columns as strings even when every cell looks numeric.
    #[must_use]
    pub fn with_text_columns(mut self, names: &[&str]) -> Self {
        self.text_columns = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Table, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so that our own InconsistentRowLength check fires
        // instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(file);

        let names = self.header_names(&mut rdr)?;
        let n_columns = names.len();
        debug!(n_columns, "read header");

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); n_columns];
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != n_columns {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: n_columns,
                    got: record.len(),
                });
            }
            for (column, raw) in cells.iter_mut().zip(record.iter()) {
                column.push(parse_cell(raw));
            }
        }

        let n_rows = cells.first().map_or(0, Vec::len);
        if n_rows == 0 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        for name in &self.text_columns {
            if !names.contains(name) {
                warn!(column = %name, "text column not present in header");
            }
        }

        let columns: Vec<Column> = names
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| {
                let data = if self.text_columns.contains(&name) {
                    ColumnData::Text(raw)
                } else {
                    infer_column(raw)
                };
                Column::new(name, data)
            })
            .collect();
        let table = Table::new(columns)?;

        let n_numeric = table
            .columns()
            .iter()
            .filter(|c| matches!(c.data(), ColumnData::Numeric(_)))
            .count();
        info!(
            n_rows,
            n_columns,
            n_numeric,
            n_text = n_columns - n_numeric,
            "table loaded"
        );
        Ok(table)
    }

    fn header_names(&self, rdr: &mut csv::Reader<std::fs::File>) -> Result<Vec<String>, IoError> {
        let header = rdr.headers().map_err(|e| self.csv_error(e))?;
        let names: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let cell = cell.trim();
                if cell.is_empty() {
                    format!("unnamed_{i}")
                } else {
                    cell.to_string()
                }
            })
            .collect();

        let mut seen = HashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(IoError::DuplicateColumn { name: dup.clone() });
        }
        Ok(names)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

fn parse_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || MISSING_MARKERS
            .iter()
            .any(|m| trimmed.eq_ignore_ascii_case(m))
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Numeric if every present cell is a finite float, text otherwise.
fn infer_column(raw: Vec<Option<String>>) -> ColumnData {
    let parsed: Option<Vec<Option<f64>>> = raw
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some),
        })
        .collect();
    match parsed {
        Some(values) => ColumnData::Numeric(values),
        None => ColumnData::Text(raw),
    }
}
