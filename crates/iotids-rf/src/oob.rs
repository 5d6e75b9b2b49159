//! Out-of-bag evaluation.

use crate::confusion::ConfusionMatrix;
use crate::error::RfError;
use crate::tree::{DecisionTree, majority_class};

/// Accuracy of the forest on rows left out of each tree's bootstrap.
#[derive(Debug, Clone)]
pub struct OobScore {
    /// Fraction of OOB-evaluated rows predicted correctly.
    pub accuracy: f64,
    /// Confusion matrix over the OOB-evaluated rows.
    pub confusion_matrix: ConfusionMatrix,
    /// Number of rows that were out of bag for at least one tree.
    pub n_oob_samples: usize,
}

/// Vote each training row with the trees that never saw it.
///
/// Rows that were drawn into every bootstrap are skipped.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let mut votes: Vec<Vec<usize>> = vec![vec![0; n_classes]; features.len()];
    for (tree, oob_indices) in trees.iter().zip(oob_indices_per_tree) {
        for &row in oob_indices {
            votes[row][tree.predict(&features[row])?] += 1;
        }
    }

    let (truth, predicted): (Vec<usize>, Vec<usize>) = votes
        .iter()
        .zip(labels)
        .filter(|(row_votes, _)| row_votes.iter().any(|&v| v > 0))
        .map(|(row_votes, &label)| (label, majority_class(row_votes)))
        .unzip();

    if truth.is_empty() {
        return Err(RfError::OobEvaluationFailed {
            reason: "every row was drawn into every bootstrap sample".to_string(),
        });
    }

    let confusion_matrix = ConfusionMatrix::from_labels(&truth, &predicted, n_classes)?;
    Ok(OobScore {
        accuracy: confusion_matrix.accuracy(),
        n_oob_samples: truth.len(),
        confusion_matrix,
    })
}
