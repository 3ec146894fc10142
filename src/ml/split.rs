//! Seeded train/test partitioning of sample rows

use crate::structs::{Result, TyperError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of test rows: `ceil(fraction * n)`
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn test_size(n_samples: usize, fraction: f64) -> usize {
    (fraction * n_samples as f64).ceil() as usize
}

/// Shuffle `0..n_samples` with a seeded RNG; the first `test_size` become the test set
///
/// # Errors
/// Returns error if the fraction is outside (0, 1) or either partition would be empty
pub fn train_test_split(n_samples: usize, fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(TyperError::Config(format!(
            "Test fraction must be between 0 and 1, got {fraction}"
        )));
    }

    let n_test = test_size(n_samples, fraction);
    if n_test == 0 || n_test >= n_samples {
        return Err(TyperError::DataQuality(format!(
            "Cannot split {n_samples} samples into non-empty train and test sets (test fraction {fraction})"
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_sizes() {
        assert_eq!(test_size(4, 0.25), 1);
        assert_eq!(test_size(7, 0.25), 2);
        assert_eq!(test_size(100, 0.25), 25);
        assert_eq!(test_size(2, 0.25), 1);

        for (n, expected_test) in [(4, 1), (7, 2), (100, 25)] {
            let split = train_test_split(n, 0.25, 1).expect("split");
            assert_eq!(split.test.len(), expected_test);
            assert_eq!(split.train.len(), n - expected_test);
        }
    }

    #[test]
    fn test_split_is_a_partition() {
        let split = train_test_split(50, 0.25, 7).expect("split");

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = train_test_split(40, 0.25, 1).expect("split");
        let b = train_test_split(40, 0.25, 1).expect("split");
        assert_eq!(a, b);

        let c = train_test_split(40, 0.25, 2).expect("split");
        assert_ne!(a, c);
    }

    #[test]
    fn test_degenerate_splits_rejected() {
        assert!(train_test_split(1, 0.25, 1).is_err());
        assert!(train_test_split(10, 0.0, 1).is_err());
        assert!(train_test_split(10, 1.0, 1).is_err());
    }
}
