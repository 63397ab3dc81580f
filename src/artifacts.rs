use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classifier::Classifier;
use crate::config::FeatureConfig;
use crate::encoder::ClassEncoder;
use crate::scaler::StandardScaler;
use crate::{AccentError, Result};

const MANIFEST_FILE: &str = "manifest.json";
const ENCODER_FILE: &str = "label_encoder.json";
const SCALER_FILE: &str = "scaler.json";
const CLASSIFIER_FILE: &str = "classifier.json";

/// Feature settings the model was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureManifest {
    pub sample_rate: u32,
    pub n_mfcc: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub embedding_dimension: usize,
}

impl FeatureManifest {
    pub fn new(sample_rate: u32, features: &FeatureConfig) -> Self {
        Self {
            sample_rate,
            n_mfcc: features.n_mfcc,
            n_fft: features.n_fft,
            hop_length: features.hop_length,
            n_mels: features.n_mels,
            embedding_dimension: features.embedding.as_ref().map_or(0, |e| e.dimension),
        }
    }

    pub fn dimension(&self) -> usize {
        self.n_mfcc + self.embedding_dimension
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub manifest: FeatureManifest,
    pub encoder: ClassEncoder,
    pub scaler: StandardScaler,
    pub classifier: Classifier,
}

impl ModelArtifacts {
    /// Checks that every part agrees on feature dimension and class count.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let dimension = self.manifest.dimension();
        if self.scaler.n_features() != dimension {
            return Err(format!(
                "scaler expects {} features, manifest declares {}",
                self.scaler.n_features(),
                dimension
            ));
        }
        if self.classifier.n_features() != dimension {
            return Err(format!(
                "classifier expects {} features, manifest declares {}",
                self.classifier.n_features(),
                dimension
            ));
        }
        if self.encoder.is_empty() || self.classifier.n_classes() != self.encoder.len() {
            return Err(format!(
                "classifier has {} classes, label encoder has {}",
                self.classifier.n_classes(),
                self.encoder.len()
            ));
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        write_json(&dir.join(MANIFEST_FILE), &self.manifest)?;
        write_json(&dir.join(ENCODER_FILE), &self.encoder)?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;
        write_json(&dir.join(CLASSIFIER_FILE), &self.classifier)?;
        log::info!("Saved model artifacts to {}", dir.display());
        Ok(())
    }

    /// Loads and cross-checks a saved model. Every failure is an
    /// [`AccentError::ArtifactLoad`] naming the offending path.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let artifacts = Self {
            manifest: read_json(&dir.join(MANIFEST_FILE))?,
            encoder: read_json(&dir.join(ENCODER_FILE))?,
            scaler: read_json(&dir.join(SCALER_FILE))?,
            classifier: read_json(&dir.join(CLASSIFIER_FILE))?,
        };
        artifacts.validate().map_err(|reason| AccentError::ArtifactLoad {
            path: dir.to_path_buf(),
            reason,
        })?;

        log::info!(
            "Loaded model from {}: {} classes, {} features",
            dir.display(),
            artifacts.encoder.len(),
            artifacts.manifest.dimension()
        );
        Ok(artifacts)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let load_error = |reason: String| AccentError::ArtifactLoad {
        path: PathBuf::from(path),
        reason,
    };
    let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| load_error(e.to_string()))
}
