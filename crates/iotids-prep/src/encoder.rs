//! Label encoding of categorical columns.
//!
//! [`CategoricalEncoder::fit`] learns an [`EncodingTable`] from one table;
//! the table is then applied, unchanged, to every other table that has to
//! share the same codes (train, test, and later batch prediction input).

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use iotids_io::{Column, ColumnData, Table};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::PrepError;

/// Display name of the sentinel code under [`UnknownPolicy::Sentinel`].
pub const UNKNOWN_LABEL: &str = "<unknown>";

/// What `transform` does with a value the encoder never saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownPolicy {
    /// Fail with [`PrepError::UnknownCategory`].
    #[default]
    Reject,
    /// Remove the row and report it in [`Transformed::dropped_rows`].
    DropRow,
    /// Map feature values to code `k`, one past the last known code.
    /// Unseen labels are still rejected.
    Sentinel,
}

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownPolicy::Reject => f.write_str("reject"),
            UnknownPolicy::DropRow => f.write_str("drop-row"),
            UnknownPolicy::Sentinel => f.write_str("sentinel"),
        }
    }
}

impl FromStr for UnknownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(UnknownPolicy::Reject),
            "drop-row" | "drop_row" | "drop" => Ok(UnknownPolicy::DropRow),
            "sentinel" => Ok(UnknownPolicy::Sentinel),
            other => Err(format!(
                "unknown policy \"{other}\", expected reject, drop-row or sentinel"
            )),
        }
    }
}

/// Learns per-column code tables.
///
/// # Defaults
///
/// | Parameter        | Default  |
/// |------------------|----------|
/// | `unknown_policy` | `Reject` |
/// | `label_column`   | `None`   |
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    columns: Vec<String>,
    label_column: Option<String>,
    unknown_policy: UnknownPolicy,
}

impl CategoricalEncoder {
    /// Encode the given feature columns.
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            label_column: None,
            unknown_policy: UnknownPolicy::default(),
        }
    }

    /// Also encode the label column. It never receives a sentinel code.
    #[must_use]
    pub fn with_label_column(mut self, label_column: impl Into<String>) -> Self {
        self.label_column = Some(label_column.into());
        self
    }

    #[must_use]
    pub fn with_unknown_policy(mut self, unknown_policy: UnknownPolicy) -> Self {
        self.unknown_policy = unknown_policy;
        self
    }

    /// Fit one code table per target column.
    ///
    /// Distinct values are sorted byte-wise and numbered from 0. Numeric
    /// columns are encoded by their text rendering.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PrepError::MissingColumn`] | a target column is absent |
    /// | [`PrepError::MissingValue`] | a target cell is missing |
    #[instrument(skip_all, fields(n_rows = table.n_rows(), n_columns = self.columns.len()))]
    pub fn fit(&self, table: &Table) -> Result<EncodingTable, PrepError> {
        let targets = self
            .columns
            .iter()
            .map(|name| (name, false))
            .chain(self.label_column.iter().map(|name| (name, true)));

        let mut columns = Vec::new();
        for (name, is_label) in targets {
            let data = require(table, name)?.data();
            let mut values = BTreeSet::new();
            for row in 0..data.len() {
                let value = data.render(row).ok_or_else(|| PrepError::MissingValue {
                    column: name.clone(),
                    row,
                })?;
                values.insert(value);
            }
            let encoding = ColumnEncoding {
                name: name.clone(),
                is_label,
                values: values.into_iter().collect(),
            };
            info!(column = %name, n_codes = encoding.values.len(), is_label, "column encoded");
            debug!(column = %name, values = ?encoding.values, "code order");
            columns.push(encoding);
        }

        Ok(EncodingTable {
            columns,
            unknown_policy: self.unknown_policy,
        })
    }
}

fn require<'t>(table: &'t Table, name: &str) -> Result<&'t Column, PrepError> {
    table.column(name).ok_or_else(|| PrepError::MissingColumn {
        column: name.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnEncoding {
    name: String,
    is_label: bool,
    /// Sorted distinct values; a value's position is its code.
    values: Vec<String>,
}

impl ColumnEncoding {
    fn code(&self, value: &str) -> Option<usize> {
        self.values.binary_search_by(|v| v.as_str().cmp(value)).ok()
    }
}

/// Fitted, immutable mapping between categorical values and integer codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingTable {
    columns: Vec<ColumnEncoding>,
    unknown_policy: UnknownPolicy,
}

/// Output of [`EncodingTable::transform`].
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Input table with every encoded column replaced by numeric codes.
    pub table: Table,
    /// Input row indices removed under [`UnknownPolicy::DropRow`], ascending.
    pub dropped_rows: Vec<usize>,
}

impl EncodingTable {
    /// Same codes, different unseen-value policy.
    #[must_use]
    pub fn with_unknown_policy(mut self, unknown_policy: UnknownPolicy) -> Self {
        self.unknown_policy = unknown_policy;
        self
    }

    #[must_use]
    pub fn unknown_policy(&self) -> UnknownPolicy {
        self.unknown_policy
    }

    /// Encoded column names, features first, then the label column if any.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn label_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.is_label)
            .map(|c| c.name.as_str())
    }

    /// Known values of `column` in code order.
    #[must_use]
    pub fn labels(&self, column: &str) -> Option<&[String]> {
        self.get(column).map(|c| c.values.as_slice())
    }

    /// Code assigned to `value` in `column`.
    #[must_use]
    pub fn code(&self, column: &str, value: &str) -> Option<usize> {
        self.get(column)?.code(value)
    }

    /// Value behind `code`. The sentinel code of a feature column decodes to
    /// [`UNKNOWN_LABEL`].
    #[must_use]
    pub fn decode(&self, column: &str, code: usize) -> Option<&str> {
        let encoding = self.get(column)?;
        match encoding.values.get(code) {
            Some(value) => Some(value.as_str()),
            None if code == encoding.values.len()
                && !encoding.is_label
                && self.unknown_policy == UnknownPolicy::Sentinel =>
            {
                Some(UNKNOWN_LABEL)
            }
            None => None,
        }
    }

    /// Number of known codes in `column`, excluding any sentinel.
    #[must_use]
    pub fn n_codes(&self, column: &str) -> Option<usize> {
        self.get(column).map(|c| c.values.len())
    }

    fn get(&self, column: &str) -> Option<&ColumnEncoding> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Replace each encoded column with its numeric codes.
    ///
    /// The label column may be absent (unlabelled input); every feature
    /// column must be present. The input table is not modified.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PrepError::MissingColumn`] | an encoded feature column is absent |
    /// | [`PrepError::MissingValue`] | an encoded cell is missing |
    /// | [`PrepError::UnknownCategory`] | unseen value under `Reject`, or unseen label under `Sentinel` |
    #[instrument(skip_all, fields(n_rows = table.n_rows(), policy = %self.unknown_policy))]
    pub fn transform(&self, table: &Table) -> Result<Transformed, PrepError> {
        let mut encoded = table.clone();
        let mut dropped = BTreeSet::new();

        for encoding in &self.columns {
            let Some(column) = table.column(&encoding.name) else {
                if encoding.is_label {
                    debug!(column = %encoding.name, "label column absent, left unencoded");
                    continue;
                }
                return Err(PrepError::MissingColumn {
                    column: encoding.name.clone(),
                });
            };
            let codes = self.encode_column(encoding, column.data(), &mut dropped)?;
            encoded.replace_column(Column::new(
                encoding.name.clone(),
                ColumnData::Numeric(codes),
            ))?;
        }

        let dropped_rows: Vec<usize> = dropped.into_iter().collect();
        if !dropped_rows.is_empty() {
            warn!(
                n_dropped = dropped_rows.len(),
                rows = ?dropped_rows,
                "rows with unseen categories dropped"
            );
            encoded = encoded.drop_rows(&dropped_rows)?;
        }
        Ok(Transformed {
            table: encoded,
            dropped_rows,
        })
    }

    fn encode_column(
        &self,
        encoding: &ColumnEncoding,
        data: &ColumnData,
        dropped: &mut BTreeSet<usize>,
    ) -> Result<Vec<Option<f64>>, PrepError> {
        let sentinel = encoding.values.len();
        (0..data.len())
            .map(|row| {
                let value = data.render(row).ok_or_else(|| PrepError::MissingValue {
                    column: encoding.name.clone(),
                    row,
                })?;
                if let Some(code) = encoding.code(&value) {
                    return Ok(Some(code as f64));
                }
                match self.unknown_policy {
                    UnknownPolicy::DropRow => {
                        dropped.insert(row);
                        // placeholder; the row is removed after all columns are encoded
                        Ok(Some(sentinel as f64))
                    }
                    UnknownPolicy::Sentinel if !encoding.is_label => Ok(Some(sentinel as f64)),
                    _ => Err(PrepError::UnknownCategory {
                        column: encoding.name.clone(),
                        value,
                        row,
                    }),
                }
            })
            .collect()
    }

    /// Write the table as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PrepError::SerializeEncoding`] | JSON encoding failed |
    /// | [`PrepError::WriteEncoding`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PrepError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| PrepError::SerializeEncoding { source })?;
        std::fs::write(path, json).map_err(|source| PrepError::WriteEncoding {
            path: path.to_path_buf(),
            source,
        })?;
        info!(n_columns = self.columns.len(), "encoding table saved");
        Ok(())
    }

    /// Read a table written by [`EncodingTable::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PrepError::ReadEncoding`] | file read failed |
    /// | [`PrepError::ParseEncoding`] | contents are not a valid encoding table |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PrepError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PrepError::ReadEncoding {
            path: path.to_path_buf(),
            source,
        })?;
        let table: EncodingTable =
            serde_json::from_str(&json).map_err(|source| PrepError::ParseEncoding {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(n_columns = table.columns.len(), "encoding table loaded");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> ColumnData {
        ColumnData::Text(values.iter().map(|v| Some((*v).to_string())).collect())
    }

    fn traffic() -> Table {
        Table::new(vec![
            Column::new("proto", text(&["udp", "tcp", "udp", "icmp"])),
            Column::new("bytes", ColumnData::Numeric(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)])),
            Column::new("Attack_type", text(&["Normal", "DDoS", "Normal", "ARP_poisioning"])),
        ])
        .unwrap()
    }

    #[test]
    fn codes_follow_sorted_order() {
        let encoding = CategoricalEncoder::new(&["proto"])
            .with_label_column("Attack_type")
            .fit(&traffic())
            .unwrap();
        assert_eq!(encoding.labels("proto").unwrap(), ["icmp", "tcp", "udp"]);
        assert_eq!(encoding.code("proto", "udp"), Some(2));
        assert_eq!(
            encoding.labels("Attack_type").unwrap(),
            ["ARP_poisioning", "DDoS", "Normal"]
        );
        assert_eq!(encoding.label_column(), Some("Attack_type"));
        assert_eq!(encoding.columns().collect::<Vec<_>>(), ["proto", "Attack_type"]);
    }

    #[test]
    fn decode_inverts_code() {
        let encoding = CategoricalEncoder::new(&["proto"]).fit(&traffic()).unwrap();
        for value in encoding.labels("proto").unwrap() {
            let code = encoding.code("proto", value).unwrap();
            assert_eq!(encoding.decode("proto", code), Some(value.as_str()));
        }
        assert_eq!(encoding.decode("proto", 3), None);
        assert_eq!(encoding.decode("service", 0), None);
    }

    #[test]
    fn transform_replaces_columns_and_keeps_input() {
        let table = traffic();
        let encoding = CategoricalEncoder::new(&["proto"]).fit(&table).unwrap();
        let out = encoding.transform(&table).unwrap();
        assert!(out.dropped_rows.is_empty());
        assert_eq!(
            out.table.column("proto").unwrap().data(),
            &ColumnData::Numeric(vec![Some(2.0), Some(1.0), Some(2.0), Some(0.0)])
        );
        assert_eq!(table.column("proto").unwrap().data(), &text(&["udp", "tcp", "udp", "icmp"]));
    }

    #[test]
    fn numeric_columns_encode_by_rendering() {
        let table = Table::new(vec![Column::new(
            "proto",
            ColumnData::Numeric(vec![Some(17.0), Some(6.0), Some(6.0)]),
        )])
        .unwrap();
        let encoding = CategoricalEncoder::new(&["proto"]).fit(&table).unwrap();
        // byte-wise order puts "17" before "6"
        assert_eq!(encoding.labels("proto").unwrap(), ["17", "6"]);
    }

    #[test]
    fn missing_inputs_rejected() {
        let err = CategoricalEncoder::new(&["service"]).fit(&traffic()).unwrap_err();
        assert!(matches!(err, PrepError::MissingColumn { column } if column == "service"));

        let table = Table::new(vec![Column::new(
            "proto",
            ColumnData::Text(vec![Some("tcp".into()), None]),
        )])
        .unwrap();
        let err = CategoricalEncoder::new(&["proto"]).fit(&table).unwrap_err();
        assert!(matches!(err, PrepError::MissingValue { row: 1, .. }));
    }

    #[test]
    fn unseen_label_never_gets_sentinel() {
        let train = traffic().select_rows(&[0, 1]).unwrap();
        let encoding = CategoricalEncoder::new(&["proto"])
            .with_label_column("Attack_type")
            .with_unknown_policy(UnknownPolicy::Sentinel)
            .fit(&train)
            .unwrap();
        assert_eq!(encoding.decode("proto", 2), Some(UNKNOWN_LABEL));
        assert_eq!(encoding.decode("Attack_type", 2), None);

        // row 3 has an unseen proto (sentinel) and an unseen label (rejected)
        let test = traffic().select_rows(&[1, 3]).unwrap();
        let err = encoding.transform(&test).unwrap_err();
        assert!(matches!(
            err,
            PrepError::UnknownCategory { column, value, row: 1 }
                if column == "Attack_type" && value == "ARP_poisioning"
        ));
    }

    #[test]
    fn label_column_optional_at_transform() {
        let table = traffic();
        let encoding = CategoricalEncoder::new(&["proto"])
            .with_label_column("Attack_type")
            .fit(&table)
            .unwrap();
        let unlabelled = Table::new(vec![table.column("proto").unwrap().clone()]).unwrap();
        let out = encoding.transform(&unlabelled).unwrap();
        assert_eq!(out.table.n_columns(), 1);
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("drop-row".parse::<UnknownPolicy>().unwrap(), UnknownPolicy::DropRow);
        assert_eq!("Sentinel".parse::<UnknownPolicy>().unwrap(), UnknownPolicy::Sentinel);
        assert!("ignore".parse::<UnknownPolicy>().is_err());
        assert_eq!(UnknownPolicy::DropRow.to_string(), "drop-row");
    }
}
