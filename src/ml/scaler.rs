//! Per-feature standardization

use crate::structs::{Result, StandardScaler, TyperError};
use ndarray::{Array2, Axis, Zip};

impl StandardScaler {
    /// Fit mean and population standard deviation of each column
    ///
    /// # Errors
    /// Returns error if `records` has no rows
    pub fn fit(records: &Array2<f64>) -> Result<Self> {
        let mean = records
            .mean_axis(Axis(0))
            .ok_or_else(|| TyperError::DataQuality("Cannot fit scaler on zero rows".into()))?;
        let std_dev = records.std_axis(Axis(0), 0.0);

        Ok(Self { mean, std_dev })
    }

    /// Subtract the fitted mean and divide by the fitted deviation.
    /// Constant columns map to zero.
    #[must_use]
    pub fn transform(&self, records: &Array2<f64>) -> Array2<f64> {
        let mut scaled = records.clone();
        for mut row in scaled.rows_mut() {
            Zip::from(&mut row)
                .and(&self.mean)
                .and(&self.std_dev)
                .for_each(|v, &m, &s| {
                    *v = if s > 0.0 { (*v - m) / s } else { 0.0 };
                });
        }
        scaled
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scaled_training_has_zero_mean_unit_std() {
        let train = array![[1.0, 10.0], [2.0, 30.0], [3.0, 20.0], [6.0, 40.0]];
        let scaler = StandardScaler::fit(&train).expect("fit");
        let scaled = scaler.transform(&train);

        let mean = scaled.mean_axis(Axis(0)).expect("mean");
        let std = scaled.std_axis(Axis(0), 0.0);
        for j in 0..2 {
            assert!(mean[j].abs() < 1e-12);
            assert!((std[j] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_variance_maps_to_zero() {
        let train = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaler = StandardScaler::fit(&train).expect("fit");

        let scaled = scaler.transform(&array![[5.0, 2.0], [9.0, 4.0]]);
        assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.0]);
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_uses_training_statistics() {
        let train = array![[0.0], [2.0]];
        let scaler = StandardScaler::fit(&train).expect("fit");

        let scaled = scaler.transform(&array![[4.0]]);
        assert!((scaled[[0, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_empty_fails() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(&empty).is_err());
    }
}
