//! Pipeline that orchestrates preprocessing, classification and the trajectory

use super::classifier::default_models;
use super::params::build_model_inputs;
use super::runner::run_models;
use super::trajectory::{embed, TrajectoryParams};
use crate::preprocess::{clean, SAMPLE_DELIMITER};
use crate::structs::{
    CountsTable, Embedding, ModelInputs, ModelOutcome, Result, SampleTable, TyperError,
};

/// Configuration for a full run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub test_fraction: f64,
    pub split_seed: u64,
    pub model_seed: u64,
    pub n_trees: usize,
    /// Train and predict on standardized features instead of raw counts
    pub use_scaled: bool,
    pub trajectory: bool,
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            split_seed: 1,
            model_seed: 42,
            n_trees: 1000,
            use_scaled: false,
            trajectory: true,
            delimiter: SAMPLE_DELIMITER,
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct PipelineResult {
    pub samples: SampleTable,
    pub inputs: ModelInputs,
    pub outcomes: Vec<ModelOutcome>,
    /// `None` when disabled or when the embedding failed
    pub embedding: Option<Embedding>,
}

impl PipelineResult {
    #[must_use]
    pub fn n_succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Clean the raw counts and reorient them into a labelled sample table
///
/// # Errors
/// Returns error if a cell is not numeric or nothing is left after cleanup
pub fn prepare(counts: &CountsTable, delimiter: char) -> Result<SampleTable> {
    let cleaned = clean(counts)?;
    if cleaned.is_empty() {
        return Err(TyperError::DataQuality(format!(
            "No non-zero data left after cleanup ({} genes x {} samples in input)",
            counts.n_genes(),
            counts.n_samples()
        )));
    }
    log::info!(
        "Cleaned table: {} genes x {} samples (dropped {} genes, {} samples)",
        cleaned.n_genes(),
        cleaned.n_samples(),
        counts.n_genes() - cleaned.n_genes(),
        counts.n_samples() - cleaned.n_samples()
    );

    let samples = cleaned.into_sample_table(delimiter);
    log::info!(
        "{} categories: {}",
        samples.categories.len(),
        samples.categories.codes().join(", ")
    );
    Ok(samples)
}

/// Run the full pipeline
///
/// # Errors
/// Returns error if preprocessing or the split fails, or if every classifier
/// configuration fails. Trajectory failures are non-fatal (logged and set to `None`).
pub fn run_pipeline(counts: &CountsTable, config: &PipelineConfig) -> Result<PipelineResult> {
    let samples = prepare(counts, config.delimiter)?;
    let inputs = build_model_inputs(&samples, config.test_fraction, config.split_seed)?;

    let models = default_models(config.n_trees, config.model_seed);
    let outcomes = run_models(&inputs, &models, config.use_scaled);
    if outcomes.iter().all(|o| o.result.is_err()) {
        let reasons: Vec<String> = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| format!("{}: {e}", o.label())))
            .collect();
        return Err(TyperError::Fit(format!(
            "Every classifier failed ({})",
            reasons.join("; ")
        )));
    }

    // Trajectory (non-fatal)
    let embedding = if config.trajectory {
        log::info!("Computing trajectory embedding");
        match embed(&inputs, &TrajectoryParams::default()) {
            Ok(e) => Some(e),
            Err(e) => {
                log::warn!("Trajectory embedding failed: {e}");
                None
            }
        }
    } else {
        None
    };

    Ok(PipelineResult {
        samples,
        inputs,
        outcomes,
        embedding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Genes as rows; samples `t0.<i>` and `t1.<i>` alternate, plus an all-zero gene and sample
    fn create_test_counts(n_per_class: usize) -> CountsTable {
        let n = n_per_class * 2;
        let mut content = String::new();
        let mut header = vec![String::new()];
        for i in 0..n {
            header.push(format!("t{}.{i}", i % 2));
        }
        header.push("empty.0".into());
        let _ = writeln!(content, "{}", header.join(","));

        let rows: [(&str, fn(usize) -> f64); 4] = [
            ("marker", |i| if i % 2 == 0 { 1.0 + (i % 3) as f64 } else { 40.0 + (i % 4) as f64 }),
            ("other", |i| if i % 2 == 0 { 30.0 } else { 2.0 + (i % 5) as f64 }),
            ("noise", |i| (i % 7) as f64),
            ("silent", |_| 0.0),
        ];
        for (name, value) in rows {
            let mut cells = vec![name.to_string()];
            cells.extend((0..n).map(|i| value(i).to_string()));
            cells.push("0".into());
            let _ = writeln!(content, "{}", cells.join(","));
        }

        let mut file = NamedTempFile::new().expect("create");
        file.write_all(content.as_bytes()).expect("write");
        CountsTable::from_file(file.path(), false).expect("parse")
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            n_trees: 20,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_prepare_drops_zeros_and_codes_samples() {
        let samples = prepare(&create_test_counts(4), '.').expect("prepare");

        assert_eq!(samples.n_samples(), 8);
        assert_eq!(samples.genes, vec!["genemarker", "geneother", "genenoise"]);
        assert_eq!(samples.categories.codes(), vec!["A", "B"]);
        assert_eq!(samples.labels[..3], ["A", "B", "A"]);
    }

    #[test]
    fn test_full_pipeline() {
        let counts = create_test_counts(20);

        let result = run_pipeline(&counts, &fast_config()).expect("pipeline");

        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.n_succeeded(), 3);
        assert_eq!(result.inputs.x_test.nrows(), 10);
        assert_eq!(result.inputs.x_train.nrows(), 30);
        for outcome in &result.outcomes {
            let eval = outcome.result.as_ref().expect("ok");
            assert!(eval.accuracy > 0.99, "{}", outcome.label());
        }
        let embedding = result.embedding.expect("trajectory ran");
        assert_eq!(embedding.coords.nrows(), 40);
    }

    #[test]
    fn test_trajectory_can_be_disabled() {
        let config = PipelineConfig {
            trajectory: false,
            ..fast_config()
        };
        let result = run_pipeline(&create_test_counts(10), &config).expect("pipeline");
        assert!(result.embedding.is_none());
    }

    #[test]
    fn test_same_input_same_outcome() {
        let counts = create_test_counts(10);
        let a = run_pipeline(&counts, &fast_config()).expect("pipeline");
        let b = run_pipeline(&counts, &fast_config()).expect("pipeline");

        assert_eq!(a.inputs.test_indices, b.inputs.test_indices);
        for (x, y) in a.outcomes.iter().zip(&b.outcomes) {
            let (x, y) = (x.result.as_ref().expect("ok"), y.result.as_ref().expect("ok"));
            assert_eq!(x.predictions, y.predictions);
            assert_eq!(x.confusion, y.confusion);
        }
    }

    #[test]
    fn test_all_zero_input_is_data_quality_error() {
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(b",a.1,b.1\ng1,0,0\ng2,0,0\n").expect("write");
        let counts = CountsTable::from_file(file.path(), false).expect("parse");

        let err = run_pipeline(&counts, &fast_config()).expect_err("should fail");
        assert!(matches!(err, TyperError::DataQuality(_)));
    }

    #[test]
    fn test_single_category_rejected() {
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(b",a.1,a.2,a.3,a.4\ng1,1,2,3,4\ng2,4,3,2,1\n")
            .expect("write");
        let counts = CountsTable::from_file(file.path(), false).expect("parse");

        let err = run_pipeline(&counts, &fast_config()).expect_err("should fail");
        assert!(matches!(err, TyperError::DataQuality(_)));
    }

    #[test]
    fn test_partial_failure_still_succeeds() {
        let config = PipelineConfig {
            n_trees: 0,
            ..fast_config()
        };
        // random forest fails on zero trees; the boosters still run
        let result = run_pipeline(&create_test_counts(10), &config).expect("pipeline");
        assert_eq!(result.n_succeeded(), 2);
        assert!(result.outcomes[0].result.is_err());
    }
}
