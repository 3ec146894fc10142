//! Accuracy, confusion matrix and per-class classification report

use crate::structs::{ClassMetrics, ClassificationReport, ConfusionMatrix};
use std::fmt;

/// Fraction of predictions exactly matching the true labels
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

impl ConfusionMatrix {
    /// Count true (row) against predicted (column) class indices over `labels`
    #[must_use]
    pub fn from_predictions(truth: &[usize], predicted: &[usize], labels: &[String]) -> Self {
        let k = labels.len();
        let mut counts = vec![vec![0usize; k]; k];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < k && p < k {
                counts[t][p] += 1;
            }
        }
        Self {
            labels: labels.to_vec(),
            counts,
        }
    }

    /// Number of samples whose true class is each row
    #[must_use]
    pub fn row_sums(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// Number of samples predicted as each column
    #[must_use]
    pub fn col_sums(&self) -> Vec<usize> {
        (0..self.labels.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum())
            .collect()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.row_sums().iter().sum()
    }

    /// Diagonal over total
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.labels.len()).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }

    #[must_use]
    pub fn max_count(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Precision, recall, F1 and support for every class that appears in
    /// either the true or the predicted labels
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_confusion(confusion: &ConfusionMatrix) -> Self {
        let rows = confusion.row_sums();
        let cols = confusion.col_sums();

        let classes: Vec<ClassMetrics> = confusion
            .labels
            .iter()
            .enumerate()
            .filter(|(i, _)| rows[*i] > 0 || cols[*i] > 0)
            .map(|(i, label)| {
                let tp = confusion.counts[i][i];
                let precision = ratio(tp, cols[i]);
                let recall = ratio(tp, rows[i]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1,
                    support: rows[i],
                }
            })
            .collect();

        let total = confusion.total();
        let n = classes.len().max(1) as f64;
        let macro_avg = ClassMetrics {
            label: "macro avg".into(),
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
            support: total,
        };

        let weight = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes
                    .iter()
                    .map(|c| f(c) * c.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            label: "weighted avg".into(),
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1: weight(|c| c.f1),
            support: total,
        };

        Self {
            accuracy: confusion.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once(self.weighted_avg.label.len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;

        let row = |f: &mut fmt::Formatter<'_>, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )
        };

        for class in &self.classes {
            row(f, class)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, &self.macro_avg)?;
        row(f, &self.weighted_avg)
    }
}
