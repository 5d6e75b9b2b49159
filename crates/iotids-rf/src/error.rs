use std::path::PathBuf;

/// Errors from forest training, prediction, scoring and model files.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    // --- configuration ---
    #[error("a forest needs at least one tree (n_trees = {n_trees})")]
    InvalidTreeCount { n_trees: usize },

    #[error("max_depth of {max_depth} leaves no room for a split; use 1 or more")]
    InvalidMaxDepth { max_depth: usize },

    #[error("min_samples_split of {min_samples_split} is below the minimum of 2")]
    InvalidMinSamplesSplit { min_samples_split: usize },

    #[error("min_samples_leaf of {min_samples_leaf} is below the minimum of 1")]
    InvalidMinSamplesLeaf { min_samples_leaf: usize },

    /// `max_features` resolved outside `[1, n_features]`.
    #[error("max_features = {max_features} is not usable with {n_features} feature columns")]
    InvalidMaxFeatures {
        /// Column count after resolving the strategy.
        max_features: usize,
        n_features: usize,
    },

    #[error("bootstrap fraction {fraction} is outside (0, 1]")]
    InvalidBootstrapFraction { fraction: f64 },

    // --- input shape ---
    /// No rows were supplied to training or scoring.
    #[error("no rows to work with")]
    EmptyDataset,

    #[error("feature rows have no columns")]
    ZeroFeatures,

    /// A training row is wider or narrower than the first row.
    #[error("row {sample_index} has {got} columns; the first row has {expected}")]
    FeatureCountMismatch {
        expected: usize,
        got: usize,
        sample_index: usize,
    },

    #[error("{n_labels} labels supplied for {n_features_rows} rows")]
    LabelCountMismatch {
        n_features_rows: usize,
        n_labels: usize,
    },

    #[error("got {n_names} feature names but the rows have {n_features} columns")]
    FeatureNameMismatch { n_names: usize, n_features: usize },

    /// A row passed to a trained forest does not match its training width.
    #[error("model was trained on {expected} features, row has {got}")]
    PredictionFeatureMismatch { expected: usize, got: usize },

    /// NaN or infinity in the training matrix. The offending cell is
    /// reported by position.
    #[error("value at row {sample_index}, column {feature_index} is not finite")]
    NonFiniteValue {
        sample_index: usize,
        feature_index: usize,
    },

    /// A label does not fit the class count of the confusion matrix.
    #[error("row {sample_index} has class {class}, but only {n_classes} classes are known")]
    ClassOutOfRange {
        class: usize,
        n_classes: usize,
        sample_index: usize,
    },

    #[error("out-of-bag score unavailable: {reason}")]
    OobEvaluationFailed { reason: String },

    // --- model files ---
    #[error("could not encode the forest")]
    SerializeModel { source: Box<bincode::ErrorKind> },

    #[error("{path} is not a readable model file")]
    DeserializeModel {
        path: PathBuf,
        source: Box<bincode::ErrorKind>,
    },

    #[error("could not write model file {path}")]
    WriteModel {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not read model file {path}")]
    ReadModel {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not an iotids model file")]
    NotAModelFile { path: PathBuf },

    /// The file was written by a build with a different envelope version.
    #[error("model file {path} has format version {found}, this build reads version {expected}")]
    IncompatibleModelVersion {
        expected: u32,
        found: u32,
        path: PathBuf,
    },
}
