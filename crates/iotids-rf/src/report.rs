//! Human-readable text rendering of an evaluation.

use std::fmt;

use crate::eval::{AveragedMetrics, Evaluation};
use crate::importance::RankedFeature;

const BAR_WIDTH: usize = 40;

/// Plain-text classification report with class names.
///
/// Renders the per-class precision/recall/F1/support table, the averages,
/// the labelled confusion matrix and, when importances are attached, a
/// character bar chart of the top columns.
#[derive(Debug, Clone)]
pub struct ClassificationReport<'a> {
    evaluation: &'a Evaluation,
    class_names: &'a [String],
    importances: &'a [RankedFeature],
    top_k: usize,
}

impl<'a> ClassificationReport<'a> {
    #[must_use]
    pub fn new(evaluation: &'a Evaluation, class_names: &'a [String]) -> Self {
        Self {
            evaluation,
            class_names,
            importances: &[],
            top_k: 10,
        }
    }

    /// Append a bar chart of the `top_k` most important columns.
    #[must_use]
    pub fn with_importances(mut self, importances: &'a [RankedFeature], top_k: usize) -> Self {
        self.importances = importances;
        self.top_k = top_k;
        self
    }

    fn class_name(&self, class: usize) -> String {
        self.class_names
            .get(class)
            .cloned()
            .unwrap_or_else(|| class.to_string())
    }

    fn write_average(
        f: &mut fmt::Formatter<'_>,
        label: &str,
        avg: &AveragedMetrics,
        support: usize,
        width: usize,
    ) -> fmt::Result {
        writeln!(
            f,
            "{label:>width$} {:>9.4} {:>9.4} {:>9.4} {support:>9}",
            avg.precision, avg.recall, avg.f1
        )
    }
}

impl fmt::Display for ClassificationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eval = self.evaluation;
        let names: Vec<String> = eval
            .class_metrics
            .iter()
            .map(|m| self.class_name(m.class))
            .collect();
        let width = names.iter().map(String::len).max().unwrap_or(0).max(12);
        let total = eval.confusion_matrix.total();

        writeln!(f, "Accuracy: {:.4}", eval.accuracy)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, m) in names.iter().zip(&eval.class_metrics) {
            writeln!(
                f,
                "{name:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        Self::write_average(f, "macro avg", &eval.macro_avg, total, width)?;
        Self::write_average(f, "weighted avg", &eval.weighted_avg, total, width)?;

        writeln!(f)?;
        writeln!(f, "Confusion matrix:")?;
        write!(
            f,
            "{}",
            eval.confusion_matrix.to_labelled_string(self.class_names)
        )?;

        if !self.importances.is_empty() && self.top_k > 0 {
            let shown = &self.importances[..self.top_k.min(self.importances.len())];
            let name_width = shown.iter().map(|r| r.name.len()).max().unwrap_or(0);
            let max = shown.first().map_or(0.0, |r| r.importance);
            writeln!(f)?;
            writeln!(f, "Top {} features:", shown.len())?;
            for ranked in shown {
                let filled = if max > 0.0 {
                    ((ranked.importance / max) * BAR_WIDTH as f64).round() as usize
                } else {
                    0
                };
                writeln!(
                    f,
                    "{:>3}. {:<name_width$} {:<BAR_WIDTH$} {:.4}",
                    ranked.rank,
                    ranked.name,
                    "#".repeat(filled),
                    ranked.importance
                )?;
            }
        }
        Ok(())
    }
}
