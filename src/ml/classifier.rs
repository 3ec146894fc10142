//! Classifier configurations and fitting dispatch

use super::adaboost::AdaBoost;
use super::boosting::GradientBoosting;
use super::forest::RandomForest;
use crate::structs::{Classifier, ModelConfig, ModelKind, Result};
use ndarray::{Array1, Array2};

impl ModelKind {
    /// Fit a fresh classifier of this kind
    ///
    /// # Errors
    /// Returns error if the underlying algorithm cannot be fitted
    pub fn fit(
        &self,
        records: &Array2<f64>,
        targets: &Array1<usize>,
        n_classes: usize,
    ) -> Result<Box<dyn Classifier>> {
        Ok(match *self {
            Self::RandomForest { n_trees, seed } => Box::new(RandomForest::fit(
                records, targets, n_classes, n_trees, seed,
            )?),
            Self::GradientBoosting {
                n_stages,
                learning_rate,
                max_depth,
            } => Box::new(GradientBoosting::fit(
                records,
                targets,
                n_classes,
                n_stages,
                learning_rate,
                max_depth,
            )?),
            Self::AdaBoost {
                n_estimators,
                learning_rate,
            } => Box::new(AdaBoost::fit(
                records,
                targets,
                n_classes,
                n_estimators,
                learning_rate,
            )?),
        })
    }
}

impl ModelConfig {
    #[must_use]
    pub fn new(label: &str, kind: ModelKind) -> Self {
        Self {
            label: label.to_string(),
            kind,
        }
    }
}

/// The standard menu: random forest, gradient boosting and AdaBoost
#[must_use]
pub fn default_models(n_trees: usize, seed: u64) -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("Random Forest", ModelKind::RandomForest { n_trees, seed }),
        ModelConfig::new(
            "Gradient Boosting",
            ModelKind::GradientBoosting {
                n_stages: 100,
                learning_rate: 0.1,
                max_depth: 3,
            },
        ),
        ModelConfig::new(
            "AdaBoost",
            ModelKind::AdaBoost {
                n_estimators: 50,
                learning_rate: 1.0,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::params::tests::separable_table;

    #[test]
    fn test_default_menu() {
        let models = default_models(1000, 42);
        let labels: Vec<&str> = models.iter().map(|m| m.label.as_str()).collect();

        assert_eq!(labels, vec!["Random Forest", "Gradient Boosting", "AdaBoost"]);
        assert_eq!(
            models[0].kind,
            ModelKind::RandomForest {
                n_trees: 1000,
                seed: 42
            }
        );
        // the boosters are deterministic and record no seed
        for config in &models[1..] {
            let value = serde_json::to_value(config.kind).expect("serialize");
            assert!(value.get("seed").is_none(), "{}", config.label);
        }
    }

    #[test]
    fn test_every_kind_fits_through_dispatch() {
        let table = separable_table(8);
        for config in default_models(20, 42) {
            let model = config
                .kind
                .fit(&table.data, &table.targets, 2)
                .expect("fit");
            assert_eq!(model.predict(&table.data), table.targets, "{}", config.label);
            assert_eq!(model.feature_importance().len(), 4);
        }
    }
}
