//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::error::RfError;
use crate::importance::{RankedFeature, rank_features};
use crate::oob::compute_oob;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// A fitted Random Forest ensemble.
///
/// Immutable once trained; holds no reference to the training rows.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) feature_names: Vec<String>,
}

impl RandomForest {
    /// Rank the input columns by Mean Decrease in Impurity.
    ///
    /// Sums each column's weighted impurity decrease over every tree,
    /// normalizes the totals to sum to 1, and orders them descending with
    /// ties left in column order.
    #[must_use]
    pub fn rank_features(&self) -> Vec<RankedFeature> {
        let mut totals = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            for (total, decrease) in totals.iter_mut().zip(tree.impurity_decreases()) {
                *total += decrease;
            }
        }
        rank_features(&totals, &self.feature_names)
    }

    /// Borrow the fitted trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Check that `features` is a non-empty, rectangular, finite matrix with one
/// label per row. Returns the column count.
pub(crate) fn validate_matrix(features: &[Vec<f64>], labels: &[usize]) -> Result<usize, RfError> {
    if features.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_features_rows: features.len(),
            n_labels: labels.len(),
        });
    }
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Draw `draw_count` row indices with replacement; also return the rows never drawn.
fn bootstrap_sample(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let drawn: Vec<usize> = (0..draw_count)
        .map(|_| {
            let idx = rng.gen_range(0..n_samples);
            in_bag[idx] = true;
            idx
        })
        .collect();
    let out_of_bag = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (drawn, out_of_bag)
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_matrix(features, labels)?;
    if feature_names.len() != n_features {
        return Err(RfError::FeatureNameMismatch {
            n_names: feature_names.len(),
            n_features,
        });
    }
    let max_features = config.max_features.resolve(n_features)?;
    if config.max_depth == Some(0) {
        return Err(RfError::InvalidMaxDepth { max_depth: 0 });
    }
    if !(config.bootstrap_fraction > 0.0 && config.bootstrap_fraction <= 1.0) {
        return Err(RfError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    let n_samples = features.len();
    let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        n_classes,
        max_features,
        max_depth = ?config.max_depth,
        criterion = %config.criterion,
        "training random forest"
    );

    // Seeds are fixed before the parallel section so that the ensemble does
    // not depend on thread scheduling.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features));

    let grown: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| -> Result<(DecisionTree, Vec<usize>), RfError> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (drawn, out_of_bag) = bootstrap_sample(n_samples, draw_count, &mut rng);
            let boot_features: Vec<Vec<f64>> =
                drawn.iter().map(|&i| features[i].clone()).collect();
            let boot_labels: Vec<usize> = drawn.iter().map(|&i| labels[i]).collect();
            let tree = tree_config
                .clone()
                .with_seed(rng.r#gen())
                .fit(&boot_features, &boot_labels, n_classes)?;
            Ok((tree, out_of_bag))
        })
        .collect::<Result<_, RfError>>()?;

    let (trees, oob_indices_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) =
        grown.into_iter().unzip();

    debug!(
        n_nodes = trees.iter().map(DecisionTree::n_nodes).sum::<usize>(),
        max_tree_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
        "trees grown"
    );

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(
            &trees,
            features,
            labels,
            n_classes,
            &oob_indices_per_tree,
        )?),
        OobMode::Disabled => None,
    };

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
        feature_names: feature_names.to_vec(),
    };
    let importances = forest.rank_features();

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        "random forest training complete"
    );

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_classes,
        n_samples,
        max_features_resolved: max_features,
    };
    Ok(RandomForestResult::new(forest, importances, oob_score, metadata))
}

#[cfg(test)]
mod tests {
    use crate::config::{MaxFeatures, OobMode, RandomForestConfig};
    use crate::error::RfError;

    /// Three well separated classes along `x`; `y` is constant.
    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, offset) in [0.0, 10.0, 20.0].into_iter().enumerate() {
            for i in 0..20 {
                features.push(vec![offset + i as f64 * 0.15, 0.5]);
                labels.push(class);
            }
        }
        (features, labels, vec!["x".to_string(), "y".to_string()])
    }

    #[test]
    fn three_class_separable_accuracy() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(50)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_seed(42)
            .fit(&features, &labels, &names)
            .unwrap();

        let predictions = result.forest().predict_batch(&features).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        let accuracy = correct as f64 / labels.len() as f64;
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
    }

    #[test]
    fn oob_score_computed() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(50)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .fit(&features, &labels, &names)
            .unwrap();
        let oob = result.oob_score().expect("OOB should be computed");
        assert!(oob.accuracy > 0.8, "oob accuracy = {}", oob.accuracy);
        assert!(oob.n_oob_samples > 0);
    }

    #[test]
    fn importances_sum_to_one_and_favor_x() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(20)
            .unwrap()
            .fit(&features, &labels, &names)
            .unwrap();
        let total: f64 = result.importances().iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-10, "total = {total}");
        assert_eq!(result.importances()[0].name, "x");
        assert!(result.importances().iter().all(|f| f.importance >= 0.0));
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels, names) = make_separable_data();
        let fit = || {
            RandomForestConfig::new(10)
                .unwrap()
                .with_seed(99)
                .fit(&features, &labels, &names)
                .unwrap()
        };
        let (a, b) = (fit(), fit());
        assert_eq!(
            a.forest().predict_batch(&features).unwrap(),
            b.forest().predict_batch(&features).unwrap()
        );
        let sizes = |r: &crate::RandomForestResult| {
            r.forest().trees().iter().map(|t| t.n_nodes()).collect::<Vec<_>>()
        };
        assert_eq!(sizes(&a), sizes(&b));
    }

    #[test]
    fn max_depth_respected_by_every_tree() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(10)
            .unwrap()
            .with_max_depth(Some(1))
            .fit(&features, &labels, &names)
            .unwrap();
        assert!(result.forest().trees().iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn empty_dataset_error() {
        let config = RandomForestConfig::new(10).unwrap();
        let err = config.fit(&[], &[], &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn label_count_mismatch_error() {
        let (features, _, names) = make_separable_data();
        let err = RandomForestConfig::new(5)
            .unwrap()
            .fit(&features, &[0, 1], &names)
            .unwrap_err();
        assert!(matches!(err, RfError::LabelCountMismatch { n_features_rows: 60, n_labels: 2 }));
    }

    #[test]
    fn feature_name_mismatch_error() {
        let (features, labels, _) = make_separable_data();
        let err = RandomForestConfig::new(5)
            .unwrap()
            .fit(&features, &labels, &["x".to_string()])
            .unwrap_err();
        assert!(matches!(err, RfError::FeatureNameMismatch { n_names: 1, n_features: 2 }));
    }

    #[test]
    fn invalid_bootstrap_fraction_error() {
        let (features, labels, names) = make_separable_data();
        let err = RandomForestConfig::new(5)
            .unwrap()
            .with_bootstrap_fraction(0.0)
            .fit(&features, &labels, &names)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidBootstrapFraction { .. }));
    }
}
