//! Majority-vote prediction for the Random Forest ensemble.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::RandomForest;
use crate::tree::majority_class;

/// A forest decision for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    /// Winning class code.
    pub class: usize,
    /// Fraction of trees that voted for `class`, in (0, 1].
    pub confidence: f64,
}

/// Class probability distribution averaged over the trees' leaves.
#[derive(Debug, Clone)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    /// Argmax of the distribution; ties go to the lowest class code.
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        let mut best = 0;
        for (class, p) in self.probs.iter().enumerate() {
            if *p > self.probs[best] {
                best = class;
            }
        }
        best
    }

    /// The `k` most probable classes, most probable first.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut indexed: Vec<(usize, f64)> = self.probs.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
        indexed
    }

    /// Probability per class code.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }
}

impl RandomForest {
    /// Predict the class code for a single sample by majority vote.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        Ok(self.predict_with_confidence(sample)?.class)
    }

    /// Majority vote across all trees plus the share of trees agreeing.
    ///
    /// Votes are counted per class, so the result does not depend on tree
    /// order. Ties go to the lowest class code.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_with_confidence(&self, sample: &[f64]) -> Result<Vote, RfError> {
        self.check_width(sample)?;
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict(sample)?] += 1;
        }
        let class = majority_class(&votes);
        Ok(Vote {
            class,
            confidence: votes[class] as f64 / self.trees.len() as f64,
        })
    }

    /// Average the leaf class distributions of all trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, RfError> {
        self.check_width(sample)?;
        let mut avg = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in avg.iter_mut().zip(tree.predict_proba(sample)?) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        avg.iter_mut().for_each(|v| *v /= n);
        Ok(ClassDistribution { probs: avg })
    }

    /// Majority-vote class codes for a batch, computed in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] if any sample has the wrong width.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }

    /// Votes with confidence for a batch, computed in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] if any sample has the wrong width.
    pub fn predict_batch_with_confidence(&self, features: &[Vec<f64>]) -> Result<Vec<Vote>, RfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict_with_confidence(sample))
            .collect()
    }

    /// Averaged distributions for a batch, computed in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] if any sample has the wrong width.
    pub fn predict_proba_batch(
        &self,
        features: &[Vec<f64>],
    ) -> Result<Vec<ClassDistribution>, RfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    /// Columns each input row must have.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of class codes the forest can predict.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Training column names, in input order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn check_width(&self, sample: &[f64]) -> Result<(), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MaxFeatures, RandomForestConfig};
    use crate::error::RfError;
    use crate::forest::RandomForest;

    fn forest() -> (RandomForest, Vec<Vec<f64>>) {
        let features: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![if i < 15 { i as f64 } else { 50.0 + i as f64 }, 1.0])
            .collect();
        let labels: Vec<usize> = (0..30).map(|i| usize::from(i >= 15)).collect();
        let names = vec!["a".to_string(), "b".to_string()];
        let result = RandomForestConfig::new(25)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .fit(&features, &labels, &names)
            .unwrap();
        (result.into_forest(), features)
    }

    #[test]
    fn confidence_is_share_of_agreeing_trees() {
        let (forest, _) = forest();
        let vote = forest.predict_with_confidence(&[2.0, 1.0]).unwrap();
        assert_eq!(vote.class, 0);
        assert!(vote.confidence > 0.5 && vote.confidence <= 1.0);
        let scaled = vote.confidence * forest.n_trees() as f64;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn vote_is_independent_of_tree_order() {
        let (forest, features) = forest();
        let mut reversed = forest.clone();
        reversed.trees.reverse();
        for sample in &features {
            assert_eq!(
                forest.predict_with_confidence(sample).unwrap(),
                reversed.predict_with_confidence(sample).unwrap()
            );
        }
    }

    #[test]
    fn batch_matches_individual() {
        let (forest, features) = forest();
        let batch = forest.predict_batch_with_confidence(&features).unwrap();
        for (sample, vote) in features.iter().zip(&batch) {
            assert_eq!(forest.predict_with_confidence(sample).unwrap(), *vote);
        }
        let proba = forest.predict_proba_batch(&features).unwrap();
        assert!((proba[0].as_slice().iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(proba[0].top_k(1)[0].0, proba[0].predicted_class());
    }

    #[test]
    fn wrong_width_rejected() {
        let (forest, _) = forest();
        assert!(matches!(
            forest.predict(&[1.0]),
            Err(RfError::PredictionFeatureMismatch { expected: 2, got: 1 })
        ));
    }
}
