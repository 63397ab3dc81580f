use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::{AccentError, Result};

/// Per-dimension zero-mean / unit-variance normalisation.
///
/// Fit once on the training matrix; inference only ever calls the
/// transform methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fits on rows of `features`. Constant columns get a scale of 1.
    pub fn fit(features: &Array2<f64>) -> Result<Self> {
        if features.nrows() == 0 {
            return Err(AccentError::EmptyTrainingSet);
        }

        let mean = features
            .mean_axis(Axis(0))
            .ok_or(AccentError::EmptyTrainingSet)?;
        let scale = features
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_dimension(features.ncols())?;
        Ok((features - &self.mean) / &self.scale)
    }

    pub fn transform_single(&self, features: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_dimension(features.len())?;
        Ok((&features - &self.mean) / &self.scale)
    }

    fn check_dimension(&self, got: usize) -> Result<()> {
        if got != self.n_features() {
            return Err(AccentError::DimensionMismatch {
                expected: self.n_features(),
                got,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Axis};

    #[test]
    fn test_fit_transform_standardizes() {
        let x = array![[1.0, 10.0, 5.0], [3.0, 20.0, 5.0], [5.0, 30.0, 5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();

        let means = scaled.mean_axis(Axis(0)).unwrap();
        let stds = scaled.std_axis(Axis(0), 0.0);
        for d in 0..2 {
            assert!(means[d].abs() < 1e-12);
            assert!((stds[d] - 1.0).abs() < 1e-12);
        }
        // constant column is centred but not blown up
        assert!(scaled.column(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [4.0, 1.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let sample = array![3.0, 3.0];

        let first = scaler.transform_single(sample.view()).unwrap();
        let second = scaler.transform_single(sample.view()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, scaler.transform(&sample.clone().insert_axis(Axis(0))).unwrap().row(0));
    }

    #[test]
    fn test_dimension_mismatch() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let result = scaler.transform_single(array![1.0, 2.0, 3.0].view());
        assert!(matches!(
            result,
            Err(AccentError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let empty = Array2::<f64>::zeros((0, 4));
        assert!(matches!(StandardScaler::fit(&empty), Err(AccentError::EmptyTrainingSet)));
    }
}
