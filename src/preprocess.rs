//! Counts cleanup and reorientation into a labelled sample table

use crate::structs::{CategoryMap, CleanedTable, CountsTable, Result, SampleTable, TyperError};
use ndarray::{Array1, Array2, Axis};
use std::collections::HashMap;

/// Canonical prefix carried by every gene label
pub const GENE_PREFIX: &str = "gene";

/// Default character at which sample identifiers are truncated
pub const SAMPLE_DELIMITER: char = '.';

/// Prefix a gene label with `gene` unless it already starts with it
#[must_use]
pub fn normalize_gene_label(label: &str) -> String {
    if label.starts_with(GENE_PREFIX) {
        label.to_string()
    } else {
        format!("{GENE_PREFIX}{label}")
    }
}

/// Part of a sample identifier before the first `delimiter`
#[must_use]
pub fn truncate_sample_id(id: &str, delimiter: char) -> &str {
    id.split(delimiter).next().unwrap_or(id)
}

/// Spreadsheet-style code for a category ordinal: A..Z, then AA, AB, ...
#[must_use]
pub fn category_code(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

impl CategoryMap {
    /// Assign codes to distinct identifiers in order of first occurrence
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut source_ids: Vec<String> = Vec::new();
        for id in ids {
            if !source_ids.iter().any(|s| s == id) {
                source_ids.push(id.to_string());
            }
        }
        Self { source_ids }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.source_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_ids.is_empty()
    }

    /// Ordinal of a source identifier
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.source_ids.iter().position(|s| s == id)
    }

    /// All codes in ordinal order
    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        (0..self.len()).map(category_code).collect()
    }
}

/// Parse counts and drop all-zero genes, then all-zero samples
///
/// An all-zero input gives an empty table rather than an error; callers check
/// [`CleanedTable::is_empty`] before modelling.
///
/// # Errors
/// Returns error if any cell is not a finite number, or if two kept genes
/// share a label once prefixed with `gene`
pub fn clean(table: &CountsTable) -> Result<CleanedTable> {
    let counts = parse_counts(table)?;

    let keep_rows: Vec<usize> = counts
        .outer_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|&v| v != 0.0))
        .map(|(i, _)| i)
        .collect();
    let counts = counts.select(Axis(0), &keep_rows);

    let keep_cols: Vec<usize> = counts
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, col)| col.iter().any(|&v| v != 0.0))
        .map(|(j, _)| j)
        .collect();
    let counts = counts.select(Axis(1), &keep_cols);

    let mut seen: HashMap<String, &str> = HashMap::with_capacity(keep_rows.len());
    let mut genes = Vec::with_capacity(keep_rows.len());
    for &i in &keep_rows {
        let raw = table.genes[i].as_str();
        let label = normalize_gene_label(raw);
        if let Some(first) = seen.insert(label.clone(), raw) {
            return Err(TyperError::InputShape(format!(
                "Gene labels {first:?} and {raw:?} both normalize to {label:?}"
            )));
        }
        genes.push(label);
    }
    let samples = keep_cols.iter().map(|&j| table.samples[j].clone()).collect();

    Ok(CleanedTable {
        genes,
        samples,
        counts,
    })
}

fn parse_counts(table: &CountsTable) -> Result<Array2<f64>> {
    let mut counts = Array2::zeros((table.n_genes(), table.n_samples()));
    for (i, row) in table.cells.iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            let value = cell
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    TyperError::InputShape(format!(
                        "Non-numeric count {cell:?} for gene {} in sample {}",
                        table.genes[i], table.samples[j]
                    ))
                })?;
            counts[[i, j]] = value;
        }
    }
    Ok(counts)
}

impl CleanedTable {
    /// Transpose to samples x genes and replace sample identifiers by category codes
    #[must_use]
    pub fn into_sample_table(self, delimiter: char) -> SampleTable {
        let truncated: Vec<&str> = self
            .samples
            .iter()
            .map(|s| truncate_sample_id(s, delimiter))
            .collect();
        let categories = CategoryMap::from_ids(truncated.iter().copied());

        let targets: Array1<usize> = truncated
            .iter()
            .map(|id| categories.index_of(id).unwrap_or_default())
            .collect();
        let labels = targets.iter().map(|&t| category_code(t)).collect();

        let data = self.counts.t().as_standard_layout().into_owned();

        SampleTable {
            genes: self.genes,
            sample_ids: self.samples,
            labels,
            targets,
            categories,
            data,
        }
    }
}
