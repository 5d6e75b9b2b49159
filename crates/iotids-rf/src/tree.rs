use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{instrument, trace};

use crate::{
    RfError,
    node::{Node, NodeIndex},
    split::{SplitCriterion, SplitSearch},
};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Gini`                |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                    |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth (root is depth 0). `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each child of a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set how many randomly drawn columns are evaluated at each node.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train a decision tree on a row-major dataset.
    ///
    /// `labels` are zero-based class codes; the tree sizes its leaf counts to
    /// `max(n_classes, max(labels) + 1)` so that every tree of a forest
    /// reports distributions of the same length.
    ///
    /// # Errors
    ///
    /// | Variant                             | When                                            |
    /// |-------------------------------------|-------------------------------------------------|
    /// | [`RfError::EmptyDataset`]           | `features` is empty                             |
    /// | [`RfError::ZeroFeatures`]           | rows have zero feature columns                  |
    /// | [`RfError::LabelCountMismatch`]     | `labels.len() != features.len()`                |
    /// | [`RfError::FeatureCountMismatch`]   | rows have inconsistent lengths                  |
    /// | [`RfError::NonFiniteValue`]         | any value is NaN or infinite                    |
    /// | [`RfError::InvalidMaxDepth`]        | `max_depth` is `Some(0)`                        |
    /// | [`RfError::InvalidMinSamplesSplit`] | `min_samples_split` < 2                         |
    /// | [`RfError::InvalidMinSamplesLeaf`]  | `min_samples_leaf` < 1                          |
    /// | [`RfError::InvalidMaxFeatures`]     | `max_features` outside [1, n_features]          |
    #[instrument(skip_all, fields(n_samples = features.len()))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<DecisionTree, RfError> {
        let n_features = crate::validate_matrix(features, labels)?;
        self.validate(n_features)?;

        let max_features = self.max_features.unwrap_or(n_features);
        let n_classes = n_classes.max(labels.iter().max().map_or(0, |&m| m + 1));

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|f| features.iter().map(|row| row[f]).collect())
            .collect();

        let mut builder = TreeBuilder {
            search: SplitSearch {
                columns: &columns,
                labels,
                n_classes,
                criterion: self.criterion,
                max_features,
                min_samples_leaf: self.min_samples_leaf,
            },
            config: self,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            nodes: Vec::new(),
        };
        let samples: Vec<usize> = (0..features.len()).collect();
        builder.grow(&samples, 0);

        trace!(n_nodes = builder.nodes.len(), "decision tree grown");

        Ok(DecisionTree {
            nodes: builder.nodes,
            n_features,
            n_classes,
        })
    }

    fn validate(&self, n_features: usize) -> Result<(), RfError> {
        if self.max_depth == Some(0) {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(())
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the largest count; ties go to the lowest index.
pub(crate) fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}

struct TreeBuilder<'a> {
    search: SplitSearch<'a>,
    config: &'a DecisionTreeConfig,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `samples` depth-first and return its root.
    fn grow(&mut self, samples: &[usize], depth: usize) -> NodeIndex {
        let n_samples = samples.len();
        let mut class_counts = vec![0usize; self.search.n_classes];
        for &s in samples {
            class_counts[self.search.labels[s]] += 1;
        }
        let impurity = self.config.criterion.impurity(&class_counts, n_samples);

        let at_depth_cap = self.config.max_depth.is_some_and(|d| depth >= d);
        let split = if at_depth_cap
            || impurity.is_pure()
            || n_samples < self.config.min_samples_split
        {
            None
        } else {
            self.search
                .best_split(samples, &class_counts, impurity, &mut self.rng)
        };

        let Some(split) = split else {
            let idx = NodeIndex::new(self.nodes.len());
            self.nodes.push(Node::Leaf {
                prediction: majority_class(&class_counts),
                class_counts,
                impurity,
                n_samples,
            });
            return idx;
        };

        // Reserve the slot so the parent precedes its children in the arena.
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            prediction: 0,
            class_counts: Vec::new(),
            impurity,
            n_samples,
        });
        let left = self.grow(&split.left_indices, depth + 1);
        let right = self.grow(&split.right_indices, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };
        NodeIndex::new(idx)
    }
}

/// A fitted CART decision tree stored as a flat node arena rooted at 0.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class code for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        match self.leaf_for(sample)? {
            Node::Leaf { prediction, .. } => Ok(*prediction),
            Node::Split { .. } => unreachable!("traversal always ends at a leaf"),
        }
    }

    /// Return the class distribution of the leaf reached by `sample`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, RfError> {
        Ok(self
            .leaf_for(sample)?
            .distribution()
            .unwrap_or_else(|| vec![0.0; self.n_classes]))
    }

    /// Total weighted impurity decrease contributed by each feature column.
    ///
    /// Unnormalized, so that a forest can sum contributions across trees
    /// before normalizing.
    #[must_use]
    pub fn impurity_decreases(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        totals
    }

    /// Mean Decrease in Impurity for this tree alone, normalized to sum to 1.
    ///
    /// All zeros when the tree is a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = self.impurity_decreases();
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Number of nodes, splits and leaves together.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Depth of the deepest leaf; a lone root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }

    /// Borrow the node arena.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn leaf_for(&self, sample: &[f64]) -> Result<&Node, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                leaf @ Node::Leaf { .. } => return Ok(leaf),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        (features, vec![0, 0, 0, 1, 1, 1])
    }

    fn xor() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        (features, vec![0, 1, 1, 0])
    }

    #[test]
    fn majority_class_prefers_lowest_on_tie() {
        assert_eq!(majority_class(&[3, 5, 5]), 1);
        assert_eq!(majority_class(&[2, 2]), 0);
        assert_eq!(majority_class(&[]), 0);
    }

    #[test]
    fn empty_dataset_error() {
        let err = DecisionTreeConfig::new().fit(&[], &[], 2).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn label_count_mismatch_error() {
        let (features, _) = separable();
        let err = DecisionTreeConfig::new()
            .fit(&features, &[0, 1], 2)
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::LabelCountMismatch { n_features_rows: 6, n_labels: 2 }
        ));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tree = DecisionTreeConfig::new().fit(&features, &[0, 0, 0], 1).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&[2.0, 3.0]).unwrap(), 0);
        assert!(tree.feature_importances().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn separable_predictions() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn near_max_values_grow_one_split() {
        let features = vec![vec![1.5e308], vec![1.6e308], vec![1.7e308], vec![1.79e308]];
        let labels = [0, 0, 1, 1];
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.depth(), 1);
        let preds: Vec<usize> = features.iter().map(|f| tree.predict(f).unwrap()).collect();
        assert_eq!(preds, labels);
        assert!((tree.feature_importances()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn adjacent_floats_still_separate() {
        let up = f64::from_bits(1.0_f64.to_bits() + 1);
        let features = vec![vec![1.0], vec![1.0], vec![up], vec![up]];
        let tree = DecisionTreeConfig::new().fit(&features, &[0, 0, 1, 1], 2).unwrap();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict(&[1.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[up]).unwrap(), 1);
    }

    #[test]
    fn leaf_distribution_padded_to_requested_classes() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 4).unwrap();
        let proba = tree.predict_proba(&[1.5, 0.0]).unwrap();
        assert_eq!(proba.len(), 4);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn xor_needs_two_levels_and_cap_holds() {
        let (features, labels) = xor();
        let full = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        assert!(full.depth() >= 2);

        let capped = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit(&features, &labels, 2)
            .unwrap();
        assert!(capped.depth() <= 1);
    }

    #[test]
    fn importances_credit_informative_column() {
        let features = vec![
            vec![1.0, 100.0],
            vec![2.0, 300.0],
            vec![3.0, 200.0],
            vec![10.0, 100.0],
            vec![11.0, 300.0],
            vec![12.0, 200.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        let imp = tree.feature_importances();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        assert!(imp[0] > imp[1]);
        assert!((tree.impurity_decreases()[0] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn same_seed_same_tree() {
        let (features, labels) = xor();
        let a = DecisionTreeConfig::new()
            .with_max_features(Some(1))
            .with_seed(7)
            .fit(&features, &labels, 2)
            .unwrap();
        let b = DecisionTreeConfig::new()
            .with_max_features(Some(1))
            .with_seed(7)
            .fit(&features, &labels, 2)
            .unwrap();
        assert_eq!(a.n_nodes(), b.n_nodes());
        for sample in &features {
            assert_eq!(a.predict(sample).unwrap(), b.predict(sample).unwrap());
        }
    }

    #[test]
    fn invalid_config_rejected() {
        let (features, labels) = separable();
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&features, &labels, 2)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidMaxDepth { .. }));

        let err = DecisionTreeConfig::new()
            .with_max_features(Some(3))
            .fit(&features, &labels, 2)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidMaxFeatures { max_features: 3, n_features: 2 }));
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        assert!(matches!(
            tree.predict(&[1.0]).unwrap_err(),
            RfError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn non_finite_value_error() {
        let features = vec![vec![1.0, f64::NAN], vec![3.0, 4.0]];
        let err = DecisionTreeConfig::new().fit(&features, &[0, 1], 2).unwrap_err();
        assert!(matches!(err, RfError::NonFiniteValue { sample_index: 0, feature_index: 1 }));
    }
}
