//! Random Forest classification: train, evaluate, rank, predict.
//!
//! CART decision trees with Gini/Entropy criteria, bootstrap aggregation
//! trained in parallel with rayon, out-of-bag scoring, impurity-based
//! feature ranking, held-out evaluation and bincode model persistence.

mod config;
mod confusion;
mod error;
mod eval;
mod forest;
mod importance;
mod node;
mod oob;
mod predict;
mod report;
mod result;
mod serialize;
mod split;
mod tree;

pub(crate) use forest::validate_matrix;

pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::RfError;
pub use eval::{AveragedMetrics, Evaluation, evaluate};
pub use forest::RandomForest;
pub use importance::RankedFeature;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use predict::{ClassDistribution, Vote};
pub use report::ClassificationReport;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
