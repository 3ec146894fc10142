//! Bagged Gini classification trees

use super::classification_tree::ClassificationTree;
use super::regression_tree::SortedColumns;
use super::stats::{argmax, finite_or_zero, normalize_sum};
use crate::structs::{Classifier, Result, TyperError};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random forest: each tree sees a bootstrap sample of rows and a random
/// subspace of `sqrt(p)` features; predictions are a majority vote
pub struct RandomForest {
    trees: Vec<ClassificationTree>,
    n_features: usize,
    n_classes: usize,
}

/// Number of features drawn for each tree
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn subspace_size(n_features: usize) -> usize {
    ((n_features as f64).sqrt().round() as usize).clamp(1, n_features.max(1))
}

impl RandomForest {
    /// Grow `n_trees` Gini trees from a seeded RNG
    ///
    /// # Errors
    /// Returns error if there is no training data or a target is out of range
    pub fn fit(
        records: &Array2<f64>,
        targets: &Array1<usize>,
        n_classes: usize,
        n_trees: usize,
        seed: u64,
    ) -> Result<Self> {
        let (n_samples, n_features) = records.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(TyperError::Fit("Random forest needs training data".into()));
        }
        if n_trees == 0 {
            return Err(TyperError::Fit("Random forest needs at least one tree".into()));
        }
        if targets.len() != n_samples {
            return Err(TyperError::Fit(format!(
                "Random forest got {} targets for {n_samples} rows",
                targets.len()
            )));
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= n_classes) {
            return Err(TyperError::Fit(format!(
                "Target {bad} out of range for {n_classes} classes"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let k = subspace_size(n_features);
        let sorted = SortedColumns::new(records);
        let labels = targets.to_vec();
        let mut trees = Vec::with_capacity(n_trees);
        let mut draws = vec![0.0; n_samples];

        for _ in 0..n_trees {
            draws.iter_mut().for_each(|d| *d = 0.0);
            for _ in 0..n_samples {
                draws[rng.random_range(0..n_samples)] += 1.0;
            }
            let mut features = rand::seq::index::sample(&mut rng, n_features, k).into_vec();
            features.sort_unstable();

            trees.push(ClassificationTree::fit(
                records, &labels, n_classes, &draws, &features, &sorted,
            ));
        }

        Ok(Self {
            trees,
            n_features,
            n_classes,
        })
    }
}

impl Classifier for RandomForest {
    fn predict(&self, records: &Array2<f64>) -> Array1<usize> {
        let mut votes = Array2::<f64>::zeros((records.nrows(), self.n_classes));
        for tree in &self.trees {
            for (i, row) in records.outer_iter().enumerate() {
                let class = tree.predict_row(row);
                if class < self.n_classes {
                    votes[[i, class]] += 1.0;
                }
            }
        }

        votes
            .outer_iter()
            .map(|row| argmax(row.as_slice().unwrap_or(&[])))
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn feature_importance(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            let local = normalize_sum(finite_or_zero(tree.importance().to_vec()));
            for (t, value) in total.iter_mut().zip(local) {
                *t += value;
            }
        }
        let n = self.trees.len().max(1) as f64;
        normalize_sum(total.into_iter().map(|v| v / n).collect())
    }

    fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}
