//! Per-column descriptive statistics for a loaded table.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{ColumnData, ColumnKind, Table};

/// Statistics for one column.
///
/// Numeric columns fill `mean`, `std`, `min` and `max`; text columns fill
/// `distinct`. `std` is the sample standard deviation and is `None` with
/// fewer than two present values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    /// Non-missing cells.
    pub count: usize,
    pub missing: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<usize>,
}

/// Shape and per-column statistics of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_columns: usize,
    pub columns: Vec<ColumnSummary>,
}

impl DatasetSummary {
    #[must_use]
    pub fn from_table(table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|column| summarize(column.name(), column.data()))
            .collect();
        Self {
            n_rows: table.n_rows(),
            n_columns: table.n_columns(),
            columns,
        }
    }

    /// Missing cells across the whole table.
    #[must_use]
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }

    /// Emit the shape and missing counts at `info`, one line per column at `debug`.
    pub fn log(&self) {
        info!(
            n_rows = self.n_rows,
            n_columns = self.n_columns,
            total_missing = self.total_missing(),
            "dataset summary"
        );
        for c in &self.columns {
            if c.missing > 0 {
                info!(column = %c.name, missing = c.missing, "column has missing values");
            }
            debug!(
                column = %c.name,
                kind = %c.kind,
                count = c.count,
                mean = c.mean,
                std = c.std,
                min = c.min,
                max = c.max,
                distinct = c.distinct,
                "column summary"
            );
        }
    }
}

fn summarize(name: &str, data: &ColumnData) -> ColumnSummary {
    let missing = data.n_missing();
    let count = data.len() - missing;
    let mut summary = ColumnSummary {
        name: name.to_string(),
        kind: data.kind(),
        count,
        missing,
        mean: None,
        std: None,
        min: None,
        max: None,
        distinct: None,
    };
    match data {
        ColumnData::Numeric(values) => {
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            if present.is_empty() {
                return summary;
            }
            let n = present.len() as f64;
            let mean = present.iter().sum::<f64>() / n;
            summary.mean = Some(mean);
            summary.min = present.iter().copied().reduce(f64::min);
            summary.max = present.iter().copied().reduce(f64::max);
            if present.len() > 1 {
                let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
                summary.std = Some((ss / (n - 1.0)).sqrt());
            }
        }
        ColumnData::Text(values) => {
            let distinct: HashSet<&str> = values.iter().flatten().map(String::as_str).collect();
            summary.distinct = Some(distinct.len());
        }
    }
    summary
}
