//! JSON result writer for pipeline artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;
use crate::summary::DatasetSummary;

/// Writes pipeline artifacts as pretty-printed JSON.
///
/// Creates the output directory on construction if it does not exist.
/// Every file is named `{experiment}_{kind}.{ext}`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

/// Per-class metrics as written to the evaluation artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ClassRecord<'a> {
    pub class: usize,
    pub name: &'a str,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// One ranked input column.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRecord<'a> {
    pub name: &'a str,
    pub importance: f64,
    pub rank: usize,
}

/// Row counts of the train/test partition.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SplitRecord {
    pub n_train: usize,
    pub n_test: usize,
    pub test_fraction: f64,
    pub seed: u64,
    /// Rows removed by the unknown-category policy.
    pub dropped_rows: usize,
}

/// Everything the evaluation artifact reports.
///
/// Built from primitives so this crate stays independent of the classifier.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord<'a> {
    pub label_column: &'a str,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub oob_accuracy: Option<f64>,
    pub split: SplitRecord,
    pub class_metrics: Vec<ClassRecord<'a>>,
    /// Rows are true classes, columns are predicted classes.
    pub confusion_matrix: &'a [Vec<usize>],
    pub feature_importances: Vec<FeatureRecord<'a>>,
}

/// One classified row.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord<'a> {
    /// Value of the row-index column, when the input has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub class: usize,
    pub label: &'a str,
    pub confidence: f64,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write the dataset summary to `{experiment}_summary.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_summary(&self, summary: &DatasetSummary) -> Result<PathBuf, IoError> {
        self.write_json(
            "summary",
            &SummaryArtifact {
                experiment: self.experiment.as_str(),
                summary,
            },
        )
    }

    /// Write evaluation results to `{experiment}_evaluate.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_evaluation(&self, record: &EvaluationRecord<'_>) -> Result<PathBuf, IoError> {
        self.write_json(
            "evaluate",
            &EvaluateArtifact {
                experiment: self.experiment.as_str(),
                n_classes: record.class_metrics.len(),
                evaluation: record,
            },
        )
    }

    /// Write per-row predictions to `{experiment}_predict.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n_rows = predictions.len()))]
    pub fn write_predictions(
        &self,
        predictions: &[PredictionRecord<'_>],
    ) -> Result<PathBuf, IoError> {
        self.write_json(
            "predict",
            &PredictArtifact {
                experiment: self.experiment.as_str(),
                n_rows: predictions.len(),
                predictions,
            },
        )
    }

    /// `{output_dir}/{experiment}_model.bin`. Does not write anything.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.artifact_path("model", "bin")
    }

    /// `{output_dir}/{experiment}_encoding.json`. Does not write anything.
    #[must_use]
    pub fn encoding_path(&self) -> PathBuf {
        self.artifact_path("encoding", "json")
    }

    fn artifact_path(&self, kind: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{kind}.{ext}", self.experiment.as_str()))
    }

    fn write_json(&self, kind: &str, artifact: &impl Serialize) -> Result<PathBuf, IoError> {
        let path = self.artifact_path(kind, "json");
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::SerializeJson {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        info!(path = %path.display(), "{kind} artifact written");
        Ok(path)
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct SummaryArtifact<'a> {
    experiment: &'a str,
    #[serde(flatten)]
    summary: &'a DatasetSummary,
}

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    n_classes: usize,
    #[serde(flatten)]
    evaluation: &'a EvaluationRecord<'a>,
}

#[derive(Serialize)]
struct PredictArtifact<'a> {
    experiment: &'a str,
    n_rows: usize,
    predictions: &'a [PredictionRecord<'a>],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnData, Table};
    use tempfile::TempDir;

    fn writer(dir: &Path, name: &str) -> ResultWriter {
        ResultWriter::new(dir, ExperimentName::new(name.into()).unwrap()).unwrap()
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn evaluation_json_structure() {
        let dir = TempDir::new().unwrap();
        let w = writer(dir.path(), "eval_run");
        let matrix = vec![vec![3, 1], vec![0, 4]];
        let record = EvaluationRecord {
            label_column: "Attack_type",
            accuracy: 0.875,
            macro_f1: 0.87,
            weighted_f1: 0.87,
            oob_accuracy: None,
            split: SplitRecord {
                n_train: 32,
                n_test: 8,
                test_fraction: 0.2,
                seed: 42,
                dropped_rows: 0,
            },
            class_metrics: vec![
                ClassRecord {
                    class: 0,
                    name: "DDoS",
                    precision: 1.0,
                    recall: 0.75,
                    f1: 0.857,
                    support: 4,
                },
                ClassRecord {
                    class: 1,
                    name: "Normal",
                    precision: 0.8,
                    recall: 1.0,
                    f1: 0.889,
                    support: 4,
                },
            ],
            confusion_matrix: &matrix,
            feature_importances: vec![FeatureRecord {
                name: "flow_duration",
                importance: 1.0,
                rank: 1,
            }],
        };
        let path = w.write_evaluation(&record).unwrap();
        assert_eq!(path, dir.path().join("eval_run_evaluate.json"));

        let content = read_json(&path);
        assert_eq!(content["experiment"], "eval_run");
        assert_eq!(content["n_classes"], 2);
        assert_eq!(content["accuracy"], 0.875);
        assert!(content["oob_accuracy"].is_null());
        assert_eq!(content["split"]["n_train"], 32);
        assert_eq!(content["class_metrics"][1]["name"], "Normal");
        assert_eq!(content["confusion_matrix"][0][1], 1);
        assert_eq!(content["feature_importances"][0]["rank"], 1);
    }

    #[test]
    fn summary_and_predictions_written() {
        let dir = TempDir::new().unwrap();
        let w = writer(dir.path(), "batch");
        let table = Table::new(vec![Column::new(
            "bytes",
            ColumnData::Numeric(vec![Some(1.0), None]),
        )])
        .unwrap();
        w.write_summary(&DatasetSummary::from_table(&table)).unwrap();
        let summary = read_json(&dir.path().join("batch_summary.json"));
        assert_eq!(summary["n_rows"], 2);
        assert_eq!(summary["columns"][0]["missing"], 1);

        let rows = [
            PredictionRecord {
                id: Some("17".into()),
                class: 1,
                label: "Normal",
                confidence: 0.9,
            },
            PredictionRecord {
                id: None,
                class: 0,
                label: "DDoS",
                confidence: 0.6,
            },
        ];
        w.write_predictions(&rows).unwrap();
        let predict = read_json(&dir.path().join("batch_predict.json"));
        assert_eq!(predict["n_rows"], 2);
        assert_eq!(predict["predictions"][0]["id"], "17");
        assert!(predict["predictions"][1].get("id").is_none());
    }

    #[test]
    fn creates_nested_output_dir_and_names_paths() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let w = writer(&nested, "paths");
        assert!(nested.is_dir());
        assert_eq!(w.model_path(), nested.join("paths_model.bin"));
        assert_eq!(w.encoding_path(), nested.join("paths_encoding.json"));
    }
}
