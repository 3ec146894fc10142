//! Consolidated public types for the celltyper crate
//!
//! This module contains all public structs, enums, and traits used across the crate.

use ndarray::{Array1, Array2};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum TyperError {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input shape error: {0}")]
    InputShape(String),

    #[error("Data quality error: {0}")]
    DataQuality(String),

    #[error("Model fit error: {0}")]
    Fit(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TyperError>;

// ============================================================================
// Table Types
// ============================================================================

/// Raw counts table as read from disk: genes as rows, samples as columns
#[derive(Debug, Clone)]
pub struct CountsTable {
    /// Row labels (gene identifiers)
    pub genes: Vec<String>,
    /// Column labels (cell sample identifiers)
    pub samples: Vec<String>,
    /// One row of string-encoded counts per gene
    pub cells: Vec<Vec<String>>,
}

impl CountsTable {
    /// Get number of gene rows
    #[must_use]
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    /// Get number of sample columns
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }
}

/// Counts with all-zero genes and samples removed; still genes x samples
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub genes: Vec<String>,
    pub samples: Vec<String>,
    pub counts: Array2<f64>,
}

impl CleanedTable {
    #[must_use]
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// True when cleanup removed every gene or every sample
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty() || self.samples.is_empty()
    }
}

/// Category codes in first-seen order of their source identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    pub source_ids: Vec<String>,
}

/// Samples as rows, genes as columns, one category per row
#[derive(Debug, Clone)]
pub struct SampleTable {
    /// Feature names (gene labels)
    pub genes: Vec<String>,
    /// Untruncated sample identifiers, for mapping rows back to the input
    pub sample_ids: Vec<String>,
    /// Category code of each row
    pub labels: Vec<String>,
    /// Category index of each row (position in `categories`)
    pub targets: Array1<usize>,
    pub categories: CategoryMap,
    /// Row-major samples x genes matrix
    pub data: Array2<f64>,
}

impl SampleTable {
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }
}

// ============================================================================
// ML Types
// ============================================================================

/// Per-feature standardization fitted on a training partition
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Population standard deviation; zero marks a constant column
    pub std_dev: Array1<f64>,
}

/// Everything the model runner needs, built once per run
#[derive(Debug, Clone)]
pub struct ModelInputs {
    pub features: Array2<f64>,
    pub targets: Array1<usize>,
    pub gene_names: Vec<String>,
    /// Category codes, indexed by target value
    pub class_codes: Vec<String>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<usize>,
    pub y_test: Array1<usize>,
    pub scaler: StandardScaler,
    pub x_train_scaled: Array2<f64>,
    pub x_test_scaled: Array2<f64>,
}

impl ModelInputs {
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.class_codes.len()
    }
}

/// Classifier algorithm and its hyperparameters.
/// Only the forest draws random numbers; the boosters are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest {
        n_trees: usize,
        seed: u64,
    },
    GradientBoosting {
        n_stages: usize,
        learning_rate: f64,
        max_depth: usize,
    },
    AdaBoost {
        n_estimators: usize,
        learning_rate: f64,
    },
}

/// Named classifier configuration evaluated by the model runner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    pub label: String,
    pub kind: ModelKind,
}

/// A fitted classifier over class indices `0..n_classes`
pub trait Classifier {
    /// Predict a class index for each row of `records`
    fn predict(&self, records: &Array2<f64>) -> Array1<usize>;

    /// Relative importance of each input column; sums to 1 unless all zero
    fn feature_importance(&self) -> Vec<f64>;

    /// Number of fitted base learners
    fn n_estimators(&self) -> usize;
}

/// Precision, recall and F1 for a single class
#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics plus accuracy and the macro/weighted averages
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

/// Cross-tabulation of true (rows) against predicted (columns) categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

/// Evaluation of one classifier configuration on the test partition
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub label: String,
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
    pub selected_features: Vec<String>,
    #[serde(skip)]
    pub predictions: Vec<usize>,
}

/// Outcome of a single configuration; failures stay local to it
#[derive(Debug)]
pub struct ModelOutcome {
    pub config: ModelConfig,
    pub result: Result<EvaluationResult>,
}

impl ModelOutcome {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.config.label
    }
}

/// Two-dimensional embedding of every sample
#[derive(Debug, Clone)]
pub struct Embedding {
    /// Row-aligned with the sample table
    pub coords: Array2<f64>,
    pub targets: Vec<usize>,
    pub class_codes: Vec<String>,
}
