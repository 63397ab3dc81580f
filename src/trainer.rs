use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

use crate::artifacts::{FeatureManifest, ModelArtifacts};
use crate::classifier::Classifier;
use crate::config::TrainingConfig;
use crate::encoder::ClassEncoder;
use crate::feature_store::LabeledDataset;
use crate::metrics::ClassificationReport;
use crate::scaler::StandardScaler;
use crate::{AccentError, Result};

pub struct TrainingOutcome {
    pub artifacts: ModelArtifacts,
    pub report: ClassificationReport,
    pub train_size: usize,
    pub test_size: usize,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Runs the full training procedure. Nothing is written to disk here;
    /// the caller saves `outcome.artifacts` once training has succeeded.
    pub fn train(&self, dataset: &LabeledDataset, manifest: FeatureManifest) -> Result<TrainingOutcome> {
        if dataset.is_empty() {
            return Err(AccentError::EmptyTrainingSet);
        }
        if dataset.features.ncols() != manifest.dimension() {
            return Err(AccentError::DimensionMismatch {
                expected: manifest.dimension(),
                got: dataset.features.ncols(),
            });
        }
        let distinct: BTreeSet<&str> = dataset.labels.iter().map(String::as_str).collect();
        if distinct.len() < 2 {
            return Err(AccentError::TooFewClasses { found: distinct.len() });
        }

        log::info!("Total samples: {}", dataset.len());
        log::info!("Classes: {:?}", distinct);

        let encoder = ClassEncoder::fit(&dataset.labels);
        let y = encoder.encode_all(&dataset.labels)?;

        let scaler = StandardScaler::fit(&dataset.features)?;
        let scaled = scaler.transform(&dataset.features)?;

        let (train, test) = split_indices(dataset.len(), self.config.test_fraction, self.config.seed);
        let x_train = scaled.select(Axis(0), &train);
        let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
        let x_test = scaled.select(Axis(0), &test);
        let y_test: Vec<usize> = test.iter().map(|&i| y[i]).collect();

        log::info!("Training on {} samples, holding out {}", train.len(), test.len());
        let classifier = Classifier::fit(
            &self.config.classifier,
            x_train.view(),
            &y_train,
            encoder.len(),
            self.config.seed,
        )?;

        if test.is_empty() {
            log::warn!("Holdout partition is empty; the report carries no information");
        }
        let predicted = classifier.predict_batch(x_test.view())?;
        let report = ClassificationReport::new(encoder.classes(), &y_test, &predicted);
        log::info!("Holdout accuracy: {:.4}", report.accuracy);

        Ok(TrainingOutcome {
            artifacts: ModelArtifacts {
                manifest,
                encoder,
                scaler,
                classifier,
            },
            report,
            train_size: train.len(),
            test_size: test.len(),
        })
    }
}

/// Shuffles `0..n` with `seed` and returns `(train, test)`.
///
/// The test partition holds `ceil(n * fraction)` samples but never all of them.
fn split_indices(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let wanted = (n as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize;
    let test_size = wanted.min(n.saturating_sub(1));
    let train = indices.split_off(test_size);
    (train, indices)
}
