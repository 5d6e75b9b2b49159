//! End-to-end integration tests: CSV -> Table -> summary -> JSON.

use std::fs;
use std::path::{Path, PathBuf};

use iotids_io::{ColumnKind, DatasetSummary, ExperimentName, ResultWriter, TableReader};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn traffic_fixture_loads_with_expected_schema() {
    let table = TableReader::new(&fixture_path("traffic_small.csv"))
        .read()
        .expect("fixture should parse");

    assert_eq!(table.shape(), (90, 9));
    assert_eq!(table.require_column("proto").unwrap().kind(), ColumnKind::Text);
    assert_eq!(table.require_column("service").unwrap().kind(), ColumnKind::Text);
    assert_eq!(table.require_column("Attack_type").unwrap().kind(), ColumnKind::Text);
    assert_eq!(table.require_column("id").unwrap().kind(), ColumnKind::Numeric);

    let labels = table.value_counts("Attack_type").unwrap();
    assert_eq!(labels.len(), 3);
    assert!(labels.iter().all(|(_, n)| *n == 30));
    // equal counts fall back to alphabetical order
    assert_eq!(labels[0].0, "DOS_SYN_Hping");
}

#[test]
fn summary_round_trip_through_json() {
    let table = TableReader::new(&fixture_path("traffic_small.csv"))
        .read()
        .unwrap();
    let summary = DatasetSummary::from_table(&table);
    let payload = summary
        .columns
        .iter()
        .find(|c| c.name == "payload_bytes_per_second")
        .unwrap();
    assert_eq!(payload.missing, 5);
    assert_eq!(payload.count, 85);

    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), ExperimentName::new("fixture".into()).unwrap())
        .unwrap();
    let path = writer.write_summary(&summary).unwrap();

    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(content["experiment"], "fixture");
    assert_eq!(content["n_rows"], 90);
    assert_eq!(content["columns"].as_array().unwrap().len(), 9);
    assert_eq!(content["columns"][1]["name"], "proto");
    assert_eq!(content["columns"][1]["distinct"], 2);
}
