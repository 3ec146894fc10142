//! Output file writers for the run phase

use crate::structs::{
    CategoryMap, ClassificationReport, ConfusionMatrix, Embedding, ModelKind, ModelOutcome,
    Result, SampleTable,
};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// `"<label> Accuracy: 0.0000"`, as printed and written to `report.txt`
#[must_use]
pub fn accuracy_line(label: &str, accuracy: f64) -> String {
    format!("{label} Accuracy: {accuracy:.4}")
}

/// Human-readable accuracy and classification report for every configuration
#[must_use]
pub fn format_report(outcomes: &[ModelOutcome]) -> String {
    use std::fmt::Write as _;

    let mut content = String::new();
    for outcome in outcomes {
        match &outcome.result {
            Ok(eval) => {
                let _ = writeln!(content, "{}", accuracy_line(&eval.label, eval.accuracy));
                let _ = writeln!(content, "{}", eval.report);
            }
            Err(e) => {
                let _ = writeln!(content, "{} FAILED: {e}", outcome.label());
                let _ = writeln!(content);
            }
        }
    }
    content
}

/// Write `report.txt`
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_report(output_dir: &Path, outcomes: &[ModelOutcome]) -> Result<()> {
    let path = output_dir.join("report.txt");
    fs::write(path, format_report(outcomes))?;
    Ok(())
}

/// Write `metrics.json` - machine-readable outcomes
///
/// # Errors
/// Returns error if serialization or the write fails
pub fn write_metrics_json(
    output_dir: &Path,
    samples: &SampleTable,
    n_train: usize,
    n_test: usize,
    outcomes: &[ModelOutcome],
) -> Result<()> {
    let path = output_dir.join("metrics.json");

    let output = MetricsOutput {
        n_samples: samples.n_samples(),
        n_features: samples.n_features(),
        n_train,
        n_test,
        categories: samples.categories.codes(),
        models: outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(eval) => ModelEntry {
                    label: &outcome.config.label,
                    config: &outcome.config.kind,
                    status: "ok",
                    error: None,
                    accuracy: Some(eval.accuracy),
                    n_selected_features: Some(eval.selected_features.len()),
                    selected_features: Some(&eval.selected_features),
                    report: Some(&eval.report),
                    confusion: Some(&eval.confusion),
                    test_predictions: Some(
                        eval.predictions
                            .iter()
                            .filter_map(|&p| eval.confusion.labels.get(p).cloned())
                            .collect(),
                    ),
                },
                Err(e) => ModelEntry {
                    label: &outcome.config.label,
                    config: &outcome.config.kind,
                    status: "failed",
                    error: Some(e.to_string()),
                    accuracy: None,
                    n_selected_features: None,
                    selected_features: None,
                    report: None,
                    confusion: None,
                    test_predictions: None,
                },
            })
            .collect(),
    };

    let json = serde_json::to_string_pretty(&output)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write `categories.csv` - code to source identifier mapping
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_categories(output_dir: &Path, categories: &CategoryMap) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join("categories.csv"))?;
    writer.write_record(["code", "source_id"])?;
    for (code, source) in categories.codes().iter().zip(&categories.source_ids) {
        writer.write_record([code.as_str(), source.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `embedding.csv` - one row per sample with its trajectory coordinates
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_embedding(output_dir: &Path, samples: &SampleTable, embedding: &Embedding) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join("embedding.csv"))?;
    writer.write_record(["sample", "category", "x", "y"])?;
    for ((sample, label), row) in samples
        .sample_ids
        .iter()
        .zip(&samples.labels)
        .zip(embedding.coords.rows())
    {
        writer.write_record([
            sample.clone(),
            label.clone(),
            format!("{:.6}", row[0]),
            format!("{:.6}", row[1]),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the sample table: category code column followed by one column per gene
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_sample_table(path: &Path, samples: &SampleTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = Vec::with_capacity(samples.n_features() + 1);
    header.push("category".to_string());
    header.extend(samples.genes.iter().cloned());
    writer.write_record(&header)?;

    for (label, row) in samples.labels.iter().zip(samples.data.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.iter().map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

// JSON output structures

#[derive(Serialize)]
struct MetricsOutput<'a> {
    n_samples: usize,
    n_features: usize,
    n_train: usize,
    n_test: usize,
    categories: Vec<String>,
    models: Vec<ModelEntry<'a>>,
}

#[derive(Serialize)]
struct ModelEntry<'a> {
    label: &'a str,
    config: &'a ModelKind,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_selected_features: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_features: Option<&'a Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ClassificationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confusion: Option<&'a ConfusionMatrix>,
    /// Predicted code for each test sample, in test-partition order
    #[serde(skip_serializing_if = "Option::is_none")]
    test_predictions: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics::accuracy;
    use crate::structs::{EvaluationResult, ModelConfig, TyperError};
    use ndarray::{array, Array1};
    use tempfile::TempDir;

    fn sample_table() -> SampleTable {
        SampleTable {
            genes: vec!["gene1".into(), "gene2".into()],
            sample_ids: vec!["x.1".into(), "y.1".into(), "x.2".into()],
            labels: vec!["A".into(), "B".into(), "A".into()],
            targets: Array1::from(vec![0, 1, 0]),
            categories: CategoryMap {
                source_ids: vec!["x".into(), "y".into()],
            },
            data: array![[1.0, 0.5], [0.0, 2.0], [3.0, 1.0]],
        }
    }

    fn outcomes() -> Vec<ModelOutcome> {
        let labels = vec!["A".to_string(), "B".to_string()];
        let truth = [0, 0, 1, 1];
        let predicted = [0, 1, 1, 1];
        let confusion = ConfusionMatrix::from_predictions(&truth, &predicted, &labels);
        let kind = ModelKind::RandomForest {
            n_trees: 10,
            seed: 42,
        };
        vec![
            ModelOutcome {
                config: ModelConfig::new("Random Forest", kind),
                result: Ok(EvaluationResult {
                    label: "Random Forest".into(),
                    accuracy: accuracy(&truth, &predicted),
                    report: ClassificationReport::from_confusion(&confusion),
                    confusion,
                    selected_features: vec!["gene1".into()],
                    predictions: predicted.to_vec(),
                }),
            },
            ModelOutcome {
                config: ModelConfig::new("AdaBoost", kind),
                result: Err(TyperError::Fit("stump no better than chance".into())),
            },
        ]
    }

    #[test]
    fn test_write_report() {
        let dir = TempDir::new().expect("create temp dir");
        write_report(dir.path(), &outcomes()).expect("write report");

        let content = fs::read_to_string(dir.path().join("report.txt")).expect("read");
        assert!(content.contains("Random Forest Accuracy: 0.7500"));
        assert!(content.contains("precision    recall  f1-score   support"));
        assert!(content.contains("AdaBoost FAILED: Model fit error: stump no better than chance"));
    }

    #[test]
    fn test_accuracy_line_has_four_decimals() {
        assert_eq!(accuracy_line("AdaBoost", 2.0 / 3.0), "AdaBoost Accuracy: 0.6667");
        assert_eq!(accuracy_line("Random Forest", 1.0), "Random Forest Accuracy: 1.0000");
    }

    #[test]
    fn test_write_metrics_json() {
        let dir = TempDir::new().expect("create temp dir");
        write_metrics_json(dir.path(), &sample_table(), 2, 1, &outcomes()).expect("write json");

        let content = fs::read_to_string(dir.path().join("metrics.json")).expect("read");
        let value: serde_json::Value = serde_json::from_str(&content).expect("parse");

        assert_eq!(value["n_samples"], 3);
        assert_eq!(value["categories"], serde_json::json!(["A", "B"]));
        assert_eq!(value["models"][0]["status"], "ok");
        assert_eq!(value["models"][0]["config"]["algorithm"], "random_forest");
        assert_eq!(value["models"][0]["confusion"]["counts"][0], serde_json::json!([1, 1]));
        assert_eq!(value["models"][0]["test_predictions"], serde_json::json!(["A", "B", "B", "B"]));
        assert_eq!(value["models"][1]["status"], "failed");
        assert!(value["models"][1].get("accuracy").is_none());
    }

    #[test]
    fn test_write_categories() {
        let dir = TempDir::new().expect("create temp dir");
        write_categories(dir.path(), &sample_table().categories).expect("write categories");

        let content = fs::read_to_string(dir.path().join("categories.csv")).expect("read");
        assert_eq!(content, "code,source_id\nA,x\nB,y\n");
    }

    #[test]
    fn test_write_embedding() {
        let dir = TempDir::new().expect("create temp dir");
        let embedding = Embedding {
            coords: array![[0.5, -1.0], [1.0, 2.0], [0.0, 0.0]],
            targets: vec![0, 1, 0],
            class_codes: vec!["A".into(), "B".into()],
        };
        write_embedding(dir.path(), &sample_table(), &embedding).expect("write embedding");

        let content = fs::read_to_string(dir.path().join("embedding.csv")).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "sample,category,x,y");
        assert_eq!(lines[1], "x.1,A,0.500000,-1.000000");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_write_sample_table() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("samples.csv");
        write_sample_table(&path, &sample_table()).expect("write table");

        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(content, "category,gene1,gene2\nA,1,0.5\nB,0,2\nA,3,1\n");
    }
}
