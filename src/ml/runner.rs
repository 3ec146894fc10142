//! Feature selection + classification for each configured model

use super::metrics::accuracy;
use super::select::select_by_median;
use crate::structs::{
    ClassificationReport, ConfusionMatrix, EvaluationResult, ModelConfig, ModelInputs,
    ModelOutcome, Result,
};
use ndarray::Axis;

/// Fit, select, refit and evaluate one configuration
///
/// # Errors
/// Returns error if either fit fails or feature selection keeps nothing
pub fn evaluate_model(
    inputs: &ModelInputs,
    config: &ModelConfig,
    use_scaled: bool,
) -> Result<EvaluationResult> {
    let (x_train, x_test) = if use_scaled {
        (&inputs.x_train_scaled, &inputs.x_test_scaled)
    } else {
        (&inputs.x_train, &inputs.x_test)
    };
    let n_classes = inputs.n_classes();

    let selector = config.kind.fit(x_train, &inputs.y_train, n_classes)?;
    let selection = select_by_median(&selector.feature_importance())?;
    log::info!(
        "{}: kept {} of {} features (importance >= {:.6})",
        config.label,
        selection.selected.len(),
        x_train.ncols(),
        selection.threshold
    );

    let train_selected = x_train.select(Axis(1), &selection.selected);
    let test_selected = x_test.select(Axis(1), &selection.selected);

    let classifier = config.kind.fit(&train_selected, &inputs.y_train, n_classes)?;
    log::debug!(
        "{}: refit with {} base learners",
        config.label,
        classifier.n_estimators()
    );
    let predictions = classifier.predict(&test_selected).to_vec();
    let truth = inputs.y_test.to_vec();

    let confusion = ConfusionMatrix::from_predictions(&truth, &predictions, &inputs.class_codes);
    let report = ClassificationReport::from_confusion(&confusion);

    Ok(EvaluationResult {
        label: config.label.clone(),
        accuracy: accuracy(&truth, &predictions),
        report,
        confusion,
        selected_features: selection
            .selected
            .iter()
            .map(|&i| inputs.gene_names[i].clone())
            .collect(),
        predictions,
    })
}

/// Evaluate every configuration in order; a failure is recorded and the next one still runs
#[must_use]
pub fn run_models(
    inputs: &ModelInputs,
    configs: &[ModelConfig],
    use_scaled: bool,
) -> Vec<ModelOutcome> {
    configs
        .iter()
        .map(|config| {
            log::info!("Training {}", config.label);
            let result = evaluate_model(inputs, config, use_scaled);
            match &result {
                Ok(eval) => log::info!("{} Accuracy: {:.4}", config.label, eval.accuracy),
                Err(e) => log::warn!("{} failed: {e}", config.label),
            }
            ModelOutcome {
                config: config.clone(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::default_models;
    use crate::ml::params::build_model_inputs;
    use crate::ml::params::tests::separable_table;
    use crate::structs::{ModelKind, StandardScaler, TyperError};
    use ndarray::{Array1, Array2};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_separable_data_scores_perfectly() {
        let inputs = build_model_inputs(&separable_table(20), 0.25, 1).expect("inputs");

        let outcomes = run_models(&inputs, &default_models(25, 42), false);

        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            let eval = outcome.result.as_ref().expect("model ran");
            assert!((eval.accuracy - 1.0).abs() < 1e-12, "{}", outcome.label());
            assert_eq!(eval.confusion.row_sums().iter().sum::<usize>(), 10);
            assert!(!eval.selected_features.is_empty());
        }
    }

    #[test]
    fn test_scaled_inputs_also_work() {
        let inputs = build_model_inputs(&separable_table(20), 0.25, 1).expect("inputs");
        let configs = default_models(10, 42);

        let eval = evaluate_model(&inputs, &configs[0], true).expect("scaled run");
        assert!((eval.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_shuffled_labels_near_chance() {
        let n = 400;
        let n_classes = 4;
        let mut rng = StdRng::seed_from_u64(3);
        let features = Array2::from_shape_fn((n, 6), |_| rng.random::<f64>());
        let mut labels: Vec<usize> = (0..n).map(|i| i % n_classes).collect();
        labels.shuffle(&mut rng);
        let targets = Array1::from(labels);

        let split = crate::ml::split::train_test_split(n, 0.25, 1).expect("split");
        let x_train = features.select(Axis(0), &split.train);
        let x_test = features.select(Axis(0), &split.test);
        let scaler = StandardScaler::fit(&x_train).expect("scaler");
        let inputs = ModelInputs {
            x_train_scaled: scaler.transform(&x_train),
            x_test_scaled: scaler.transform(&x_test),
            y_train: targets.select(Axis(0), &split.train),
            y_test: targets.select(Axis(0), &split.test),
            x_train,
            x_test,
            scaler,
            features,
            targets,
            gene_names: (0..6).map(|g| format!("gene{g}")).collect(),
            class_codes: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            train_indices: split.train,
            test_indices: split.test,
        };

        let config = ModelConfig::new(
            "Random Forest",
            ModelKind::RandomForest {
                n_trees: 50,
                seed: 42,
            },
        );
        let eval = evaluate_model(&inputs, &config, false).expect("run");

        // chance is 0.25
        assert!(eval.accuracy < 0.45, "accuracy {}", eval.accuracy);
    }

    #[test]
    fn test_failure_is_isolated() {
        let inputs = build_model_inputs(&separable_table(20), 0.25, 1).expect("inputs");
        let configs = vec![
            ModelConfig::new(
                "Broken Forest",
                ModelKind::RandomForest {
                    n_trees: 0,
                    seed: 42,
                },
            ),
            ModelConfig::new(
                "AdaBoost",
                ModelKind::AdaBoost {
                    n_estimators: 10,
                    learning_rate: 1.0,
                },
            ),
        ];

        let outcomes = run_models(&inputs, &configs, false);

        assert!(matches!(outcomes[0].result, Err(TyperError::Fit(_))));
        assert!(outcomes[1].result.is_ok());
    }
}
