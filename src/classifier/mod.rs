mod forest;
mod svm;

pub use forest::{ForestParams, RandomForest};
pub use svm::{scale_gamma, SvmClassifier, SvmParams};

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{ClassifierConfig, Gamma};
use crate::{AccentError, Result};

/// A fitted classifier over encoded class indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    RandomForest(RandomForest),
    Svm(SvmClassifier),
}

impl Classifier {
    /// Fits the configured classifier on scaled features and encoded labels.
    pub fn fit(
        config: &ClassifierConfig,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
        seed: u64,
    ) -> Result<Self> {
        if x.nrows() == 0 || y.is_empty() {
            return Err(AccentError::EmptyTrainingSet);
        }
        if x.nrows() != y.len() {
            return Err(AccentError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(AccentError::UnknownClassIndex(bad));
        }
        let present: BTreeSet<usize> = y.iter().copied().collect();
        if present.len() < 2 {
            return Err(AccentError::TooFewClasses { found: present.len() });
        }

        let classifier = match *config {
            ClassifierConfig::RandomForest {
                n_trees,
                max_depth,
                min_samples_split,
            } => {
                let params = ForestParams {
                    n_trees,
                    max_depth,
                    min_samples_split,
                };
                Classifier::RandomForest(RandomForest::fit(x, y, n_classes, params, seed))
            }
            ClassifierConfig::Svm {
                c,
                gamma,
                tolerance,
                max_passes,
            } => {
                let gamma = match gamma {
                    Gamma::Scale => scale_gamma(x),
                    Gamma::Value(value) => value,
                };
                let params = SvmParams {
                    c,
                    gamma,
                    tolerance,
                    max_passes,
                };
                Classifier::Svm(SvmClassifier::fit(x, y, n_classes, params))
            }
        };

        Ok(classifier)
    }

    pub fn n_features(&self) -> usize {
        match self {
            Classifier::RandomForest(forest) => forest.n_features(),
            Classifier::Svm(svm) => svm.n_features(),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Classifier::RandomForest(forest) => forest.n_classes(),
            Classifier::Svm(svm) => svm.n_classes(),
        }
    }

    pub fn supports_probability(&self) -> bool {
        matches!(self, Classifier::RandomForest(_))
    }

    pub fn predict(&self, sample: ArrayView1<f64>) -> Result<usize> {
        self.check_dimension(sample.len())?;
        let class = match self {
            Classifier::RandomForest(forest) => argmax(&forest.predict_proba(sample)),
            Classifier::Svm(svm) => svm.predict(sample),
        };
        Ok(class)
    }

    /// Class probability distribution, or `None` when the model has no estimate.
    pub fn predict_proba(&self, sample: ArrayView1<f64>) -> Result<Option<Array1<f64>>> {
        self.check_dimension(sample.len())?;
        Ok(match self {
            Classifier::RandomForest(forest) => Some(forest.predict_proba(sample)),
            Classifier::Svm(_) => None,
        })
    }

    pub fn predict_batch(&self, x: ArrayView2<f64>) -> Result<Vec<usize>> {
        x.rows().into_iter().map(|row| self.predict(row)).collect()
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

// First index wins ties.
fn argmax(values: &Array1<f64>) -> usize {
    let mut best = 0;
    for (index, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn blobs() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.1],
            [0.1, 0.0],
            [0.2, 0.1],
            [5.0, 5.1],
            [5.1, 5.0],
            [5.2, 5.1]
        ];
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_forest_has_probabilities() {
        let (x, y) = blobs();
        let classifier = Classifier::fit(&ClassifierConfig::default(), x.view(), &y, 2, 42).unwrap();
        assert!(classifier.supports_probability());

        let proba = classifier.predict_proba(array![5.0, 5.0].view()).unwrap().unwrap();
        assert!((proba.sum() - 1.0).abs() < 1e-9);
        assert_eq!(classifier.predict(array![5.0, 5.0].view()).unwrap(), 1);
    }

    #[test]
    fn test_svm_has_no_probabilities() {
        let (x, y) = blobs();
        let classifier = Classifier::fit(&ClassifierConfig::default_svm(), x.view(), &y, 2, 42).unwrap();
        assert!(!classifier.supports_probability());
        assert!(classifier.predict_proba(array![0.0, 0.0].view()).unwrap().is_none());
        assert_eq!(classifier.predict_batch(x.view()).unwrap(), y);
    }

    #[test]
    fn test_single_class_rejected() {
        let (x, _) = blobs();
        let result = Classifier::fit(&ClassifierConfig::default(), x.view(), &[0; 6], 1, 42);
        assert!(matches!(result, Err(AccentError::TooFewClasses { found: 1 })));
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let (x, y) = blobs();
        let classifier = Classifier::fit(&ClassifierConfig::default(), x.view(), &y, 2, 42).unwrap();
        assert!(matches!(
            classifier.predict(array![1.0, 2.0, 3.0].view()),
            Err(AccentError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = blobs();
        let classifier = Classifier::fit(&ClassifierConfig::default(), x.view(), &y, 2, 9).unwrap();
        let json = serde_json::to_string(&classifier).unwrap();
        let restored: Classifier = serde_json::from_str(&json).unwrap();
        let sample = array![2.5, 2.4];
        let before = classifier.predict_proba(sample.view()).unwrap().unwrap();
        let after = restored.predict_proba(sample.view()).unwrap().unwrap();
        assert!((&before - &after).iter().all(|d| d.abs() < 1e-12));
        assert_eq!(
            restored.predict_batch(x.view()).unwrap(),
            classifier.predict_batch(x.view()).unwrap()
        );
    }
}
