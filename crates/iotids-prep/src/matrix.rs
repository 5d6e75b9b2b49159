//! Extraction of a row-major feature matrix and class codes from an encoded table.

use iotids_io::{ColumnData, Table};
use tracing::{debug, instrument};

use crate::error::PrepError;

/// Which columns become features and which one holds the label.
///
/// Every column other than the label and the excluded ones is a feature,
/// in table order.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    label_column: String,
    excluded: Vec<String>,
}

impl FeatureSpec {
    pub fn new(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
            excluded: Vec::new(),
        }
    }

    /// Leave these columns out of the matrix (e.g. a row identifier).
    #[must_use]
    pub fn with_excluded<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.excluded = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    #[must_use]
    pub fn label_column(&self) -> &str {
        &self.label_column
    }
}

/// Numeric feature rows with their column names and optional class codes.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    /// `features[row][column]`.
    pub features: Vec<Vec<f64>>,
    /// Class code per row; `None` when the table has no label column.
    pub labels: Option<Vec<usize>>,
}

impl FeatureMatrix {
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PrepError::NonNumericColumn`] | a feature or the label column holds text |
    /// | [`PrepError::MissingValue`] | a feature or label cell is missing |
    /// | [`PrepError::InvalidClassCode`] | a label is not a non-negative integer |
    #[instrument(skip_all, fields(n_rows = table.n_rows()))]
    pub fn from_table(table: &Table, spec: &FeatureSpec) -> Result<Self, PrepError> {
        let feature_columns: Vec<_> = table
            .columns()
            .iter()
            .filter(|c| c.name() != spec.label_column && !spec.excluded.iter().any(|e| e == c.name()))
            .collect();

        let mut features = vec![Vec::with_capacity(feature_columns.len()); table.n_rows()];
        for column in &feature_columns {
            let values = numeric(column.name(), column.data())?;
            for (row, value) in features.iter_mut().zip(values) {
                row.push(value);
            }
        }

        let labels = match table.column(&spec.label_column) {
            Some(column) => Some(
                numeric(column.name(), column.data())?
                    .into_iter()
                    .enumerate()
                    .map(|(row, value)| class_code(column.name(), value, row))
                    .collect::<Result<Vec<usize>, PrepError>>()?,
            ),
            None => None,
        };

        let feature_names: Vec<String> =
            feature_columns.iter().map(|c| c.name().to_string()).collect();
        debug!(
            n_features = feature_names.len(),
            labelled = labels.is_some(),
            "feature matrix built"
        );
        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    /// Class codes, or an error naming the label column when the table had none.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::MissingColumn`] if the table had no label column.
    pub fn require_labels(&self, spec: &FeatureSpec) -> Result<&[usize], PrepError> {
        self.labels
            .as_deref()
            .ok_or_else(|| PrepError::MissingColumn {
                column: spec.label_column.clone(),
            })
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.len()
    }
}

fn numeric(name: &str, data: &ColumnData) -> Result<Vec<f64>, PrepError> {
    let ColumnData::Numeric(values) = data else {
        return Err(PrepError::NonNumericColumn {
            column: name.to_string(),
        });
    };
    values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| PrepError::MissingValue {
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

fn class_code(column: &str, value: f64, row: usize) -> Result<usize, PrepError> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(PrepError::InvalidClassCode {
            column: column.to_string(),
            value,
            row,
        });
    }
    Ok(value as usize)
}
