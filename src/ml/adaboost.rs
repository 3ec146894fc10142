//! Multi-class AdaBoost (SAMME) over weighted decision stumps

use super::stats::{argmax, finite_or_zero, normalize_sum};
use crate::structs::{Classifier, Result, TyperError};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2};

pub struct AdaBoost {
    stumps: Vec<(DecisionTree<f64, usize>, f64)>,
    n_features: usize,
    n_classes: usize,
}

impl AdaBoost {
    /// Boost up to `n_estimators` stumps, stopping early on a perfect fit
    ///
    /// # Errors
    /// Returns error if a stump fails to fit or the first stump is no better than chance
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn fit(
        records: &Array2<f64>,
        targets: &Array1<usize>,
        n_classes: usize,
        n_estimators: usize,
        learning_rate: f64,
    ) -> Result<Self> {
        let n_samples = records.nrows();
        if n_samples == 0 || records.ncols() == 0 {
            return Err(TyperError::Fit("AdaBoost needs training data".into()));
        }
        if n_classes < 2 {
            return Err(TyperError::Fit("AdaBoost needs at least two classes".into()));
        }

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        let mut stumps = Vec::with_capacity(n_estimators);
        let chance_error = 1.0 - 1.0 / n_classes as f64;

        for round in 0..n_estimators {
            // linfa weights are f32; keep their mean at 1 so leaf weight limits stay meaningful
            let linfa_weights = weights.mapv(|w| (w * n_samples as f64) as f32);
            let dataset =
                DatasetBase::new(records.clone(), targets.clone()).with_weights(linfa_weights);

            let stump = DecisionTree::<f64, usize>::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(Some(1))
                .min_weight_split(2e-6)
                .min_weight_leaf(1e-6)
                .fit(&dataset)
                .map_err(|e| TyperError::Fit(format!("Decision stump failed: {e}")))?;

            let predicted: Array1<usize> = stump.predict(records);
            let missed: Vec<bool> = predicted
                .iter()
                .zip(targets.iter())
                .map(|(p, t)| p != t)
                .collect();
            let error: f64 = weights
                .iter()
                .zip(&missed)
                .filter(|(_, &m)| m)
                .map(|(w, _)| w)
                .sum();

            if error <= 0.0 {
                stumps.push((stump, 1.0));
                break;
            }
            if error >= chance_error {
                if round == 0 {
                    return Err(TyperError::Fit(format!(
                        "AdaBoost base learner error {error:.4} is no better than chance"
                    )));
                }
                break;
            }

            let alpha = learning_rate
                * (((1.0 - error) / error).ln() + (n_classes as f64 - 1.0).ln());
            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let total = weights.sum();
            weights.mapv_inplace(|w| w / total);

            stumps.push((stump, alpha));
        }

        log::debug!("AdaBoost kept {} of {n_estimators} stumps", stumps.len());

        Ok(Self {
            stumps,
            n_features: records.ncols(),
            n_classes,
        })
    }
}

impl Classifier for AdaBoost {
    fn predict(&self, records: &Array2<f64>) -> Array1<usize> {
        let mut scores = Array2::<f64>::zeros((records.nrows(), self.n_classes));
        for (stump, alpha) in &self.stumps {
            let predicted: Array1<usize> = stump.predict(records);
            for (i, &class) in predicted.iter().enumerate() {
                if class < self.n_classes {
                    scores[[i, class]] += alpha;
                }
            }
        }

        scores
            .outer_iter()
            .map(|row| argmax(row.as_slice().unwrap_or(&[])))
            .collect()
    }

    fn feature_importance(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for (stump, alpha) in &self.stumps {
            let local = normalize_sum(finite_or_zero(stump.feature_importance()));
            for (t, v) in total.iter_mut().zip(local) {
                *t += alpha * v;
            }
        }
        normalize_sum(total)
    }

    fn n_estimators(&self) -> usize {
        self.stumps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::params::tests::separable_table;
    use ndarray::array;

    #[test]
    fn test_perfect_stump_stops_early() {
        let table = separable_table(10);
        let model = AdaBoost::fit(&table.data, &table.targets, 2, 50, 1.0).expect("fit");

        assert_eq!(model.n_estimators(), 1);
        assert_eq!(model.predict(&table.data), table.targets);

        let importance = model.feature_importance();
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importance[3].abs() < 1e-12);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_three_bands_need_several_rounds() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0], [9.0]];
        let y: Array1<usize> = array![0, 0, 0, 1, 1, 1, 2, 2, 2];

        let model = AdaBoost::fit(&x, &y, 3, 50, 1.0).expect("fit");
        assert!(model.n_estimators() > 1);

        let predicted = model.predict(&x);
        let correct = predicted.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / 9.0 >= 0.6);
    }

    #[test]
    fn test_rejects_single_class() {
        let x = array![[1.0], [2.0]];
        let y: Array1<usize> = array![0, 0];
        assert!(AdaBoost::fit(&x, &y, 1, 10, 1.0).is_err());
    }
}
