//! Domain types for iotids-io.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => f.write_str("numeric"),
            ColumnKind::Text => f.write_str("text"),
        }
    }
}

/// Cell values of one column. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    #[must_use]
    pub fn n_missing(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    /// True when row `i` is missing or out of range.
    #[must_use]
    pub fn is_missing(&self, i: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => v.get(i).is_none_or(Option::is_none),
            ColumnData::Text(v) => v.get(i).is_none_or(Option::is_none),
        }
    }

    /// Text rendering of row `i`, or `None` when the cell is missing.
    ///
    /// Numbers use the shortest `f64` display form, so `6.0` renders as `"6"`.
    #[must_use]
    pub fn render(&self, i: usize) -> Option<String> {
        match self {
            ColumnData::Numeric(v) => v.get(i).copied().flatten().map(|x| x.to_string()),
            ColumnData::Text(v) => v.get(i).cloned().flatten(),
        }
    }

    fn select(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Column-major in-memory table.
///
/// Every column has the same number of rows and a unique name. Operations
/// that reshape the table return a new `Table`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Assemble a table from columns.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::DuplicateColumn`] | two columns share a name |
    /// | [`IoError::ColumnLengthMismatch`] | a column's length differs from the first column's |
    pub fn new(columns: Vec<Column>) -> Result<Self, IoError> {
        let n_rows = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(IoError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
            if column.len() != n_rows {
                return Err(IoError::ColumnLengthMismatch {
                    name: column.name.clone(),
                    expected: n_rows,
                    got: column.len(),
                });
            }
        }
        Ok(Self { columns, n_rows })
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column that the caller cannot proceed without.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingColumn`] if no column has this name.
    pub fn require_column(&self, name: &str) -> Result<&Column, IoError> {
        self.column(name).ok_or_else(|| IoError::MissingColumn {
            name: name.to_string(),
        })
    }

    /// New table holding `rows` in the given order. Rows may repeat.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::RowOutOfRange`] for an index `>= n_rows`.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Table, IoError> {
        if let Some(&row) = rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(IoError::RowOutOfRange {
                row,
                n_rows: self.n_rows,
            });
        }
        Ok(Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.select(rows)))
                .collect(),
            n_rows: rows.len(),
        })
    }

    /// New table without the given rows; the rest keep their order.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::RowOutOfRange`] for an index `>= n_rows`.
    pub fn drop_rows(&self, rows: &[usize]) -> Result<Table, IoError> {
        if let Some(&row) = rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(IoError::RowOutOfRange {
                row,
                n_rows: self.n_rows,
            });
        }
        let dropped: HashSet<usize> = rows.iter().copied().collect();
        let kept: Vec<usize> = (0..self.n_rows).filter(|r| !dropped.contains(r)).collect();
        self.select_rows(&kept)
    }

    /// Take a column out of the table. Row count is unchanged.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let position = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(position))
    }

    /// Swap in a column with the same name as an existing one.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::MissingColumn`] | no column has `column.name()` |
    /// | [`IoError::ColumnLengthMismatch`] | `column.len() != n_rows` |
    pub fn replace_column(&mut self, column: Column) -> Result<(), IoError> {
        let got = column.len();
        if got != self.n_rows {
            return Err(IoError::ColumnLengthMismatch {
                name: column.name,
                expected: self.n_rows,
                got,
            });
        }
        let slot = self
            .columns
            .iter_mut()
            .find(|c| c.name == column.name)
            .ok_or_else(|| IoError::MissingColumn {
                name: column.name.clone(),
            })?;
        *slot = column;
        Ok(())
    }

    /// Occurrences of each distinct value, most frequent first, ties by value.
    /// Missing cells are not counted.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingColumn`] if no column has this name.
    pub fn value_counts(&self, name: &str) -> Result<Vec<(String, usize)>, IoError> {
        let data = self.require_column(name)?.data();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for value in (0..self.n_rows).filter_map(|i| data.render(i)) {
            *counts.entry(value).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(counts)
    }
}
