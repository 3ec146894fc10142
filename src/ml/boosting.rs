//! Multinomial-deviance gradient boosting with least-squares regression trees

use super::regression_tree::{RegressionTree, SortedColumns, TreeParams};
use super::stats::{argmax, normalize_sum};
use crate::structs::{Classifier, Result, TyperError};
use ndarray::{Array1, Array2};

/// Floor applied to class priors before taking logs
const PRIOR_EPS: f64 = 1e-12;

pub struct GradientBoosting {
    /// Initial raw score of each class (log prior)
    init: Vec<f64>,
    /// `stages[m][k]` is the tree for class `k` in stage `m`
    stages: Vec<Vec<RegressionTree>>,
    learning_rate: f64,
    n_features: usize,
}

/// Row-wise softmax of raw class scores
fn softmax(raw: &Array2<f64>) -> Array2<f64> {
    let mut probs = raw.clone();
    for mut row in probs.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    probs
}

impl GradientBoosting {
    /// Fit `n_stages` rounds of one regression tree per class
    ///
    /// # Errors
    /// Returns error if there is no training data or fewer than two classes
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(
        records: &Array2<f64>,
        targets: &Array1<usize>,
        n_classes: usize,
        n_stages: usize,
        learning_rate: f64,
        max_depth: usize,
    ) -> Result<Self> {
        let (n_samples, n_features) = records.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(TyperError::Fit("Gradient boosting needs training data".into()));
        }
        if n_classes < 2 {
            return Err(TyperError::Fit(
                "Gradient boosting needs at least two classes".into(),
            ));
        }
        if learning_rate <= 0.0 {
            return Err(TyperError::Fit(format!(
                "Learning rate must be positive, got {learning_rate}"
            )));
        }

        let mut counts = vec![0usize; n_classes];
        for &t in targets {
            if t >= n_classes {
                return Err(TyperError::Fit(format!(
                    "Target {t} outside {n_classes} classes"
                )));
            }
            counts[t] += 1;
        }
        let init: Vec<f64> = counts
            .iter()
            .map(|&c| (c as f64 / n_samples as f64).max(PRIOR_EPS).ln())
            .collect();

        let mut raw = Array2::from_shape_fn((n_samples, n_classes), |(_, k)| init[k]);
        let sorted = SortedColumns::new(records);
        let params = TreeParams {
            max_depth,
            min_samples_leaf: 1,
        };
        let scale = (n_classes as f64 - 1.0) / n_classes as f64;

        let mut stages = Vec::with_capacity(n_stages);
        for _ in 0..n_stages {
            let probs = softmax(&raw);
            let mut stage = Vec::with_capacity(n_classes);

            for k in 0..n_classes {
                let residuals: Vec<f64> = targets
                    .iter()
                    .enumerate()
                    .map(|(i, &t)| f64::from(u8::from(t == k)) - probs[[i, k]])
                    .collect();

                let leaf_value = |rows: &[usize]| {
                    let mut numerator = 0.0;
                    let mut denominator = 0.0;
                    for &r in rows {
                        let res = residuals[r];
                        numerator += res;
                        denominator += res.abs() * (1.0 - res.abs());
                    }
                    if denominator.abs() < 1e-150 {
                        0.0
                    } else {
                        scale * numerator / denominator
                    }
                };

                let tree = RegressionTree::fit(records, &residuals, &sorted, params, leaf_value);
                for (i, row) in records.outer_iter().enumerate() {
                    raw[[i, k]] += learning_rate * tree.predict_row(row);
                }
                stage.push(tree);
            }
            stages.push(stage);
        }

        Ok(Self {
            init,
            stages,
            learning_rate,
            n_features,
        })
    }

    /// Raw (pre-softmax) class scores for each row
    #[must_use]
    pub fn decision_function(&self, records: &Array2<f64>) -> Array2<f64> {
        let mut raw = Array2::from_shape_fn((records.nrows(), self.init.len()), |(_, k)| {
            self.init[k]
        });
        for stage in &self.stages {
            for (k, tree) in stage.iter().enumerate() {
                for (i, row) in records.outer_iter().enumerate() {
                    raw[[i, k]] += self.learning_rate * tree.predict_row(row);
                }
            }
        }
        raw
    }
}

impl Classifier for GradientBoosting {
    fn predict(&self, records: &Array2<f64>) -> Array1<usize> {
        self.decision_function(records)
            .outer_iter()
            .map(|row| argmax(&row.to_vec()))
            .collect()
    }

    fn feature_importance(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in self.stages.iter().flatten() {
            let local = normalize_sum(tree.importance().to_vec());
            for (t, v) in total.iter_mut().zip(local) {
                *t += v;
            }
        }
        normalize_sum(total)
    }

    fn n_estimators(&self) -> usize {
        self.stages.len()
    }
}
