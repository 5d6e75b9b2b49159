//! Held-out evaluation of a fitted forest.

use tracing::{info, instrument};

use crate::confusion::{ClassMetrics, ConfusionMatrix};
use crate::error::RfError;
use crate::forest::RandomForest;

/// Precision, recall and F1 averaged across classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AveragedMetrics {
    /// Averaged precision.
    pub precision: f64,
    /// Averaged recall.
    pub recall: f64,
    /// Averaged F1 score.
    pub f1: f64,
}

/// Outcome of scoring a forest against labelled rows.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Predicted class code per row, in input order.
    pub predictions: Vec<usize>,
    /// Share of trees agreeing with each prediction.
    pub confidences: Vec<f64>,
    /// Rows are true classes, columns are predicted classes.
    pub confusion_matrix: ConfusionMatrix,
    /// Equal to `confusion_matrix.accuracy()`.
    pub accuracy: f64,
    /// One entry per class code, including classes absent from the rows.
    pub class_metrics: Vec<ClassMetrics>,
    /// Unweighted mean over the classes that occur as a true or a predicted
    /// label. Classes missing from both are left out.
    pub macro_avg: AveragedMetrics,
    /// Mean weighted by each class's support.
    pub weighted_avg: AveragedMetrics,
}

/// Predict `features` with `forest` and compare against `labels`.
///
/// The matrix is sized to the forest's class count, so classes that never
/// appear in `labels` still get a row with zero support. Such a class only
/// enters the macro average if the forest predicted it at least once.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`RfError::EmptyDataset`] | `features` is empty |
/// | [`RfError::LabelCountMismatch`] | `labels.len() != features.len()` |
/// | [`RfError::ClassOutOfRange`] | a label is `>= forest.n_classes()` |
/// | [`RfError::PredictionFeatureMismatch`] | a row has the wrong width |
#[instrument(skip_all, fields(n_samples = features.len(), n_trees = forest.n_trees()))]
pub fn evaluate(
    forest: &RandomForest,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<Evaluation, RfError> {
    if features.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_features_rows: features.len(),
            n_labels: labels.len(),
        });
    }

    let votes = forest.predict_batch_with_confidence(features)?;
    let (predictions, confidences): (Vec<usize>, Vec<f64>) =
        votes.iter().map(|v| (v.class, v.confidence)).unzip();

    let confusion_matrix = ConfusionMatrix::from_labels(labels, &predictions, forest.n_classes())?;
    let class_metrics = confusion_matrix.class_metrics();
    let accuracy = confusion_matrix.accuracy();
    let predicted = predicted_counts(&confusion_matrix);
    let macro_avg = average(&class_metrics, |m| {
        if m.support > 0 || predicted[m.class] > 0 { 1.0 } else { 0.0 }
    });
    let weighted_avg = average(&class_metrics, |m| m.support as f64);

    info!(accuracy, macro_f1 = macro_avg.f1, weighted_f1 = weighted_avg.f1, "evaluation complete");

    Ok(Evaluation {
        predictions,
        confidences,
        confusion_matrix,
        accuracy,
        class_metrics,
        macro_avg,
        weighted_avg,
    })
}

/// Column sums of the confusion matrix: how often each class was predicted.
fn predicted_counts(matrix: &ConfusionMatrix) -> Vec<usize> {
    let mut counts = vec![0; matrix.n_classes()];
    for row in matrix.as_rows() {
        for (count, &cell) in counts.iter_mut().zip(row) {
            *count += cell;
        }
    }
    counts
}

fn average(metrics: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f64) -> AveragedMetrics {
    let total: f64 = metrics.iter().map(&weight).sum();
    if total == 0.0 {
        return AveragedMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    let mean = |field: fn(&ClassMetrics) -> f64| {
        metrics.iter().map(|m| field(m) * weight(m)).sum::<f64>() / total
    };
    AveragedMetrics {
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1: mean(|m| m.f1),
    }
}
