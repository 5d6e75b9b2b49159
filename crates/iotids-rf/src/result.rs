//! What [`crate::RandomForestConfig::fit`] hands back.

use crate::forest::RandomForest;
use crate::importance::RankedFeature;
use crate::oob::OobScore;

/// Shape of a training run, for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingMetadata {
    /// Trees in the ensemble.
    pub n_trees: usize,
    /// Feature columns each row carried.
    pub n_features: usize,
    /// One past the largest class code among the training labels.
    pub n_classes: usize,
    /// Training rows, before bootstrap resampling.
    pub n_samples: usize,
    /// Columns drawn per split once `MaxFeatures` was resolved.
    pub max_features_resolved: usize,
}

/// A fitted forest together with what was learned while fitting it.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    importances: Vec<RankedFeature>,
    oob_score: Option<OobScore>,
    metadata: TrainingMetadata,
}

impl RandomForestResult {
    pub(crate) fn new(
        forest: RandomForest,
        importances: Vec<RankedFeature>,
        oob_score: Option<OobScore>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            importances,
            oob_score,
            metadata,
        }
    }

    /// The trained ensemble, ready for prediction or saving.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Drop the training extras and keep the ensemble.
    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Feature ranking by impurity decrease, rank 1 first. Same as
    /// [`RandomForest::rank_features`] on the returned forest.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    /// Out-of-bag score; `None` unless [`crate::OobMode::Enabled`] was set.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    /// Tree count, row count and resolved split width of this run.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
