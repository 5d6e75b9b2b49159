//! Seeded train/test partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::error::PrepError;

/// Random (unstratified) train/test split configuration.
///
/// Construct via [`SplitConfig::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    test_fraction: f64,
    seed: u64,
}

/// Row indices of each partition, in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Aligned feature rows and labels of both partitions.
#[derive(Debug, Clone)]
pub struct SplitData {
    pub train_features: Vec<Vec<f64>>,
    pub test_features: Vec<Vec<f64>>,
    pub train_labels: Vec<usize>,
    pub test_labels: Vec<usize>,
}

impl SplitConfig {
    /// # Errors
    ///
    /// Returns [`PrepError::InvalidTestFraction`] unless `0 < test_fraction < 1`.
    pub fn new(test_fraction: f64) -> Result<Self, PrepError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(PrepError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }
        Ok(Self {
            test_fraction,
            seed: 42,
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Shuffle `0..n_rows` and cut it at `round(n_rows * (1 - test_fraction))`.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::EmptyPartition`] if either side would be empty.
    #[instrument(skip(self), fields(test_fraction = self.test_fraction, seed = self.seed))]
    pub fn split_indices(&self, n_rows: usize) -> Result<TrainTestSplit, PrepError> {
        let n_train = (n_rows as f64 * (1.0 - self.test_fraction)).round() as usize;
        let n_test = n_rows.saturating_sub(n_train);
        if n_train == 0 || n_test == 0 {
            return Err(PrepError::EmptyPartition {
                n_rows,
                n_train,
                n_test,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut rows: Vec<usize> = (0..n_rows).collect();
        rows.shuffle(&mut rng);
        let test = rows.split_off(n_train);

        info!(n_train, n_test, "rows split");
        Ok(TrainTestSplit { train: rows, test })
    }

    /// Split a feature matrix and its labels with [`SplitConfig::split_indices`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PrepError::LengthMismatch`] | `features.len() != labels.len()` |
    /// | [`PrepError::EmptyPartition`] | either side would be empty |
    pub fn split(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<SplitData, PrepError> {
        if features.len() != labels.len() {
            return Err(PrepError::LengthMismatch {
                n_features_rows: features.len(),
                n_labels: labels.len(),
            });
        }
        let TrainTestSplit { train, test } = self.split_indices(features.len())?;
        let rows = |idx: &[usize]| idx.iter().map(|&i| features[i].clone()).collect();
        let labels_of = |idx: &[usize]| idx.iter().map(|&i| labels[i]).collect();
        Ok(SplitData {
            train_features: rows(&train),
            test_features: rows(&test),
            train_labels: labels_of(&train),
            test_labels: labels_of(&test),
        })
    }
}
