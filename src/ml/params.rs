//! Model inputs: feature matrix, targets, split and fitted scaler

use super::split::train_test_split;
use crate::structs::{ModelInputs, Result, SampleTable, StandardScaler, TyperError};
use ndarray::Axis;

/// Build the train/test partitions and the training-only scaler
///
/// # Errors
/// Returns error if the table is empty, has fewer than two categories,
/// or is too small to split
pub fn build_model_inputs(
    samples: &SampleTable,
    test_fraction: f64,
    seed: u64,
) -> Result<ModelInputs> {
    if samples.n_samples() == 0 || samples.n_features() == 0 {
        return Err(TyperError::DataQuality(
            "Sample table is empty; nothing to model".into(),
        ));
    }
    if samples.categories.len() < 2 {
        return Err(TyperError::DataQuality(format!(
            "Classification needs at least two cell types, found {}",
            samples.categories.len()
        )));
    }

    log::info!("Feature length = {}", samples.n_samples());
    log::info!("Sample/target length = {}", samples.targets.len());

    let split = train_test_split(samples.n_samples(), test_fraction, seed)?;

    let x_train = samples.data.select(Axis(0), &split.train);
    let x_test = samples.data.select(Axis(0), &split.test);
    let y_train = samples.targets.select(Axis(0), &split.train);
    let y_test = samples.targets.select(Axis(0), &split.test);

    let scaler = StandardScaler::fit(&x_train)?;
    let x_train_scaled = scaler.transform(&x_train);
    let x_test_scaled = scaler.transform(&x_test);

    log::info!(
        "Split {} samples into {} train / {} test",
        samples.n_samples(),
        split.train.len(),
        split.test.len()
    );

    Ok(ModelInputs {
        features: samples.data.clone(),
        targets: samples.targets.clone(),
        gene_names: samples.genes.clone(),
        class_codes: samples.categories.codes(),
        train_indices: split.train,
        test_indices: split.test,
        x_train,
        x_test,
        y_train,
        y_test,
        scaler,
        x_train_scaled,
        x_test_scaled,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::structs::CategoryMap;
    use ndarray::{Array1, Array2};

    /// Two well separated cell types, `n_per_class` samples each
    pub(crate) fn separable_table(n_per_class: usize) -> SampleTable {
        let n = n_per_class * 2;
        let mut data = Array2::zeros((n, 4));
        let mut targets = Vec::with_capacity(n);
        for i in 0..n {
            let class = i % 2;
            #[allow(clippy::cast_precision_loss)]
            let jitter = (i % 5) as f64 * 0.1;
            data[[i, 0]] = if class == 0 { 1.0 + jitter } else { 10.0 + jitter };
            data[[i, 1]] = if class == 0 { 20.0 - jitter } else { 2.0 - jitter };
            data[[i, 2]] = jitter;
            data[[i, 3]] = 3.0;
            targets.push(class);
        }
        SampleTable {
            genes: (0..4).map(|g| format!("gene{g}")).collect(),
            sample_ids: (0..n).map(|i| format!("t{}.{i}", i % 2)).collect(),
            labels: targets.iter().map(|&t| if t == 0 { "A" } else { "B" }.to_string()).collect(),
            targets: Array1::from(targets),
            categories: CategoryMap {
                source_ids: vec!["t0".into(), "t1".into()],
            },
            data,
        }
    }

    #[test]
    fn test_build_model_inputs() {
        let table = separable_table(10);
        let inputs = build_model_inputs(&table, 0.25, 1).expect("inputs");

        assert_eq!(inputs.x_test.nrows(), 5);
        assert_eq!(inputs.x_train.nrows(), 15);
        assert_eq!(inputs.y_train.len(), 15);
        assert_eq!(inputs.x_train_scaled.dim(), inputs.x_train.dim());
        assert_eq!(inputs.class_codes, vec!["A", "B"]);
        assert_eq!(inputs.n_classes(), 2);
        assert_eq!(inputs.features.dim(), (20, 4));

        for (row, &idx) in inputs.test_indices.iter().enumerate() {
            assert_eq!(inputs.x_test.row(row), table.data.row(idx));
            assert_eq!(inputs.y_test[row], table.targets[idx]);
        }
    }

    #[test]
    fn test_scaler_fit_on_train_only() {
        let table = separable_table(10);
        let inputs = build_model_inputs(&table, 0.25, 1).expect("inputs");

        let refit = StandardScaler::fit(&inputs.x_train).expect("fit");
        assert_eq!(refit.mean, inputs.scaler.mean);
        // constant gene3 scales to zero everywhere
        assert!(inputs.x_test_scaled.column(3).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_single_category_rejected() {
        let mut table = separable_table(4);
        table.categories.source_ids.truncate(1);
        table.targets.fill(0);

        let err = build_model_inputs(&table, 0.25, 1).unwrap_err();
        assert!(matches!(err, TyperError::DataQuality(_)));
    }

    #[test]
    fn test_empty_table_rejected() {
        let mut table = separable_table(2);
        table.data = Array2::zeros((0, 0));
        assert!(build_model_inputs(&table, 0.25, 1).is_err());
    }
}
