//! Model-based feature selection at the median importance

use super::stats::{finite_or_zero, median};
use crate::structs::{Result, TyperError};

/// Columns kept by the selector and the threshold that kept them
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSelection {
    pub selected: Vec<usize>,
    pub threshold: f64,
}

/// Keep every feature whose importance is at least the median importance
///
/// # Errors
/// Returns error if there are no importances or nothing reaches the threshold
pub fn select_by_median(importances: &[f64]) -> Result<FeatureSelection> {
    if importances.is_empty() {
        return Err(TyperError::Fit(
            "Feature selection received no importances".into(),
        ));
    }

    let importances = finite_or_zero(importances.to_vec());
    let threshold = median(&importances);
    let selected: Vec<usize> = importances
        .iter()
        .enumerate()
        .filter(|(_, &v)| v >= threshold)
        .map(|(i, _)| i)
        .collect();

    if selected.is_empty() {
        return Err(TyperError::Fit(format!(
            "Feature selection kept zero features at threshold {threshold}"
        )));
    }

    Ok(FeatureSelection {
        selected,
        threshold,
    })
}
