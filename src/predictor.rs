use serde::Serialize;

use crate::artifacts::ModelArtifacts;
use crate::feature_extractor::FeatureVector;
use crate::Result;

/// A single classification result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Highest class probability as a percentage, 0 when the model has no
    /// probability estimates
    pub confidence: f64,
}

/// Applies a trained model to feature vectors.
///
/// The artifacts are read-only after construction, so one predictor can
/// serve any number of concurrent requests.
#[derive(Debug)]
pub struct Predictor {
    artifacts: ModelArtifacts,
}

impl Predictor {
    pub fn new(artifacts: ModelArtifacts) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        let scaled = self.artifacts.scaler.transform_single(features.view())?;
        let classifier = &self.artifacts.classifier;

        let (class, confidence) = match classifier.predict_proba(scaled.view())? {
            Some(proba) => {
                let class = classifier.predict(scaled.view())?;
                let best = proba.iter().copied().fold(0.0f64, f64::max);
                (class, (best * 100.0).clamp(0.0, 100.0))
            }
            None => (classifier.predict(scaled.view())?, 0.0),
        };

        let label = self.artifacts.encoder.decode(class)?.to_owned();
        log::debug!("Predicted {} ({:.2}%)", label, confidence);
        Ok(Prediction { label, confidence })
    }
}
