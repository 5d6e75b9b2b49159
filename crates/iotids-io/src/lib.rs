//! Table loading, dataset summaries and JSON result artifacts for the
//! iotids pipeline.

mod domain;
mod error;
mod reader;
mod summary;
mod writer;

pub use domain::{Column, ColumnData, ColumnKind, ExperimentName, Table};
pub use error::IoError;
pub use reader::TableReader;
pub use summary::{ColumnSummary, DatasetSummary};
pub use writer::{
    ClassRecord, EvaluationRecord, FeatureRecord, PredictionRecord, ResultWriter, SplitRecord,
};
