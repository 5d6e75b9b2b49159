//! Preprocessing for the iotids pipeline: categorical label encoding,
//! feature matrix extraction and seeded train/test splitting.

mod encoder;
mod error;
mod matrix;
mod split;

pub use encoder::{CategoricalEncoder, EncodingTable, Transformed, UNKNOWN_LABEL, UnknownPolicy};
pub use error::PrepError;
pub use matrix::{FeatureMatrix, FeatureSpec};
pub use split::{SplitConfig, SplitData, TrainTestSplit};
