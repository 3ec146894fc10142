use std::cmp::Ordering;

/// Calculate percentile using linear interpolation
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let k = (p / 100.0) * (sorted.len() - 1) as f64;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;

    if f == c {
        sorted[f]
    } else {
        let d0 = sorted[f] * (c as f64 - k);
        let d1 = sorted[c] * (k - f as f64);
        d0 + d1
    }
}

/// Median of unsorted values
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    percentile(&sorted, 50.0)
}

/// Index of the largest value; ties go to the lowest index
#[must_use]
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Scale non-negative values to sum to one; all-zero input stays zero
#[must_use]
pub fn normalize_sum(values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.into_iter().map(|v| v / total).collect()
    } else {
        values
    }
}

/// Replace NaN and infinite values with zero
#[must_use]
pub fn finite_or_zero(values: Vec<f64>) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| if v.is_finite() { v } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < 1e-12);
        assert!((median(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-12);
        assert!((median(&[7.0]) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert!((percentile(&sorted, 25.0) - 3.25).abs() < 1e-12);
        assert!((percentile(&sorted, 100.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_argmax_ties_lowest() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }

    #[test]
    fn test_normalize_sum() {
        assert_eq!(normalize_sum(vec![1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(normalize_sum(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
