use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// An empty node is treated as pure.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let proportions = class_counts.iter().filter(|&&c| c > 0).map(|&c| c as f64 / n);
        let value = match self {
            SplitCriterion::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
            SplitCriterion::Entropy => -proportions.map(|p| p * p.ln()).sum::<f64>(),
        };
        Impurity::new(value.max(0.0))
    }
}

impl fmt::Display for SplitCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitCriterion::Gini => f.write_str("gini"),
            SplitCriterion::Entropy => f.write_str("entropy"),
        }
    }
}

impl FromStr for SplitCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gini" => Ok(SplitCriterion::Gini),
            "entropy" => Ok(SplitCriterion::Entropy),
            other => Err(format!("unknown split criterion: {other} (expected gini or entropy)")),
        }
    }
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) impurity_decrease: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Read-only inputs shared by every split search within one tree.
///
/// `columns` is column-major: `columns[feature][sample]`.
pub(crate) struct SplitSearch<'a> {
    pub(crate) columns: &'a [Vec<f64>],
    pub(crate) labels: &'a [usize],
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

impl SplitSearch<'_> {
    /// Find the split with the largest weighted impurity decrease among
    /// `max_features` randomly drawn columns.
    ///
    /// Each candidate column is sorted once and scanned left to right with
    /// incremental class counts. Thresholds sit halfway between adjacent
    /// distinct values. Returns `None` when every candidate column is
    /// constant over `samples` or no cut respects `min_samples_leaf`.
    pub(crate) fn best_split(
        &self,
        samples: &[usize],
        parent_counts: &[usize],
        parent_impurity: Impurity,
        rng: &mut impl Rng,
    ) -> Option<SplitResult> {
        let n_features = self.columns.len();
        let n_samples = samples.len();
        if n_samples < 2 || n_features == 0 {
            return None;
        }

        // Partial Fisher-Yates over the column positions.
        let mut order: Vec<usize> = (0..n_features).collect();
        let take = self.max_features.min(n_features);
        for i in 0..take {
            let j = rng.gen_range(i..n_features);
            order.swap(i, j);
        }

        let n_total = n_samples as f64;
        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);
        let mut left_counts = vec![0usize; self.n_classes];
        let mut right_counts = vec![0usize; self.n_classes];

        for &feature in &order[..take] {
            let column = &self.columns[feature];
            sorted.clear();
            sorted.extend(samples.iter().map(|&s| (column[s], self.labels[s])));
            sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            if sorted[0].0 == sorted[n_samples - 1].0 {
                continue;
            }

            left_counts.iter_mut().for_each(|c| *c = 0);
            right_counts.copy_from_slice(parent_counts);

            for i in 0..n_samples - 1 {
                let (value, class) = sorted[i];
                left_counts[class] += 1;
                right_counts[class] -= 1;

                let next = sorted[i + 1].0;
                if value == next {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n_samples - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let left = self.criterion.impurity(&left_counts, n_left).value();
                let right = self.criterion.impurity(&right_counts, n_right).value();
                let decrease = n_total * parent_impurity.value()
                    - n_left as f64 * left
                    - n_right as f64 * right;

                if best.is_none_or(|(_, _, d)| decrease > d) {
                    best = Some((feature, midpoint(value, next), decrease));
                }
            }
        }

        let (feature, threshold, impurity_decrease) = best?;
        let column = &self.columns[feature];
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            samples.iter().copied().partition(|&s| column[s] <= threshold);
        if left_indices.is_empty() || right_indices.is_empty() {
            return None;
        }

        Some(SplitResult {
            feature: FeatureIndex::new(feature),
            threshold,
            impurity_decrease: impurity_decrease.max(0.0),
            left_indices,
            right_indices,
        })
    }
}

/// Cut point between two adjacent sorted values, `value <= cut < next`.
///
/// Halving before adding keeps values near `f64::MAX` finite. When the
/// halfway point rounds onto `next` the cut falls back to `value`, which
/// still sends exactly the scanned prefix left.
fn midpoint(value: f64, next: f64) -> f64 {
    let mid = value / 2.0 + next / 2.0;
    if value <= mid && mid < next { mid } else { value }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{SplitCriterion, SplitSearch};

    fn search<'a>(
        columns: &'a [Vec<f64>],
        labels: &'a [usize],
        min_samples_leaf: usize,
    ) -> SplitSearch<'a> {
        SplitSearch {
            columns,
            labels,
            n_classes: 2,
            criterion: SplitCriterion::Gini,
            max_features: columns.len(),
            min_samples_leaf,
        }
    }

    fn counts(labels: &[usize]) -> Vec<usize> {
        let mut c = vec![0; 2];
        for &l in labels {
            c[l] += 1;
        }
        c
    }

    #[test]
    fn gini_values() {
        assert!(SplitCriterion::Gini.impurity(&[10, 0, 0], 10).value().abs() < f64::EPSILON);
        assert!((SplitCriterion::Gini.impurity(&[5, 5], 10).value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_binary_balanced() {
        let imp = SplitCriterion::Entropy.impurity(&[5, 5], 10);
        assert!((imp.value() - 2.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn criterion_parses_case_insensitively() {
        assert_eq!("Gini".parse::<SplitCriterion>().unwrap(), SplitCriterion::Gini);
        assert_eq!("entropy".parse::<SplitCriterion>().unwrap(), SplitCriterion::Entropy);
        assert!("mse".parse::<SplitCriterion>().is_err());
    }

    #[test]
    fn separable_column_is_split_between_groups() {
        let columns = vec![vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let samples: Vec<usize> = (0..6).collect();
        let parent = counts(&labels);
        let imp = SplitCriterion::Gini.impurity(&parent, 6);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = search(&columns, &labels, 1)
            .best_split(&samples, &parent, imp, &mut rng)
            .expect("separable data must split");
        assert_eq!(split.feature.index(), 0);
        assert!((split.threshold - 6.5).abs() < f64::EPSILON);
        assert_eq!(split.left_indices, vec![0, 1, 2]);
        assert_eq!(split.right_indices, vec![3, 4, 5]);
        // 6 * 0.5 - 0 - 0
        assert!((split.impurity_decrease - 3.0).abs() < 1e-12);
    }

    #[test]
    fn constant_column_has_no_split() {
        let columns = vec![vec![5.0; 4]];
        let labels = vec![0, 0, 1, 1];
        let samples: Vec<usize> = (0..4).collect();
        let parent = counts(&labels);
        let imp = SplitCriterion::Gini.impurity(&parent, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(search(&columns, &labels, 1)
            .best_split(&samples, &parent, imp, &mut rng)
            .is_none());
    }

    #[test]
    fn cut_stays_between_neighbours() {
        use super::midpoint;
        let next_up = f64::from_bits(1.0_f64.to_bits() + 1);
        for (value, next) in [
            (1.7e308, 1.79e308),
            (f64::MAX / 2.0, f64::MAX),
            (-f64::MAX, f64::MAX),
            (1.0, next_up),
            (-3.0, -2.0),
        ] {
            let cut = midpoint(value, next);
            assert!(cut.is_finite());
            assert!(value <= cut && cut < next, "{value} {next} -> {cut}");
        }
        assert!((midpoint(3.0, 10.0) - 6.5).abs() < f64::EPSILON);
    }

    #[test]
    fn huge_values_split_where_scored() {
        let columns = vec![vec![1.5e308, 1.6e308, 1.7e308, 1.79e308]];
        let labels = vec![0, 0, 1, 1];
        let samples: Vec<usize> = (0..4).collect();
        let parent = counts(&labels);
        let imp = SplitCriterion::Gini.impurity(&parent, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let split = search(&columns, &labels, 1)
            .best_split(&samples, &parent, imp, &mut rng)
            .expect("two groups must split");
        assert!(split.threshold.is_finite());
        assert_eq!(split.left_indices, vec![0, 1]);
        assert_eq!(split.right_indices, vec![2, 3]);
        assert!((split.impurity_decrease - 2.0).abs() < 1e-12);
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let columns = vec![vec![1.0, 10.0]];
        let labels = vec![0, 1];
        let samples = vec![0, 1];
        let parent = counts(&labels);
        let imp = SplitCriterion::Gini.impurity(&parent, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(search(&columns, &labels, 2)
            .best_split(&samples, &parent, imp, &mut rng)
            .is_none());
    }
}
