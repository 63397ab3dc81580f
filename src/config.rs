use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub audio: AudioConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub extraction: ExtractionConfig,
}

/// Audio loading and capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate in Hz; every waveform is resampled to it
    pub sample_rate: u32,
    /// Shorter waveforms are rejected before feature extraction
    pub min_duration_secs: f32,
    /// Fixed microphone capture length
    pub record_duration_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            min_duration_secs: 0.5,
            record_duration_secs: 3.0,
        }
    }
}

/// Feature extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub n_mfcc: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Pretrained speech embedding appended after the MFCC means
    pub embedding: Option<EmbeddingConfig>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mfcc: 40,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            embedding: None,
        }
    }
}

impl FeatureConfig {
    /// Length of the vector produced for one waveform.
    pub fn dimension(&self) -> usize {
        self.n_mfcc + self.embedding.as_ref().map_or(0, |e| e.dimension)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// ONNX export of the speech representation model
    pub model_path: PathBuf,
    /// Hidden size of the model's last layer (1024 for HuBERT large)
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of samples held out for evaluation
    pub test_fraction: f64,
    /// Seed for the train/test shuffle and any classifier randomness
    pub seed: u64,
    pub classifier: ClassifierConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Classifier family and its fixed hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierConfig {
    RandomForest {
        n_trees: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
    },
    Svm {
        c: f64,
        gamma: Gamma,
        tolerance: f64,
        max_passes: usize,
    },
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig::RandomForest {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

impl ClassifierConfig {
    /// RBF SVM with C=10 and gamma="scale".
    pub fn default_svm() -> Self {
        ClassifierConfig::Svm {
            c: 10.0,
            gamma: Gamma::Scale,
            tolerance: 1e-3,
            max_passes: 100_000,
        }
    }
}

/// RBF kernel coefficient
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// 1 / (n_features * Var(X))
    Scale,
    Value(f64),
}

impl Serialize for Gamma {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Gamma::Scale => serializer.serialize_str("scale"),
            Gamma::Value(value) => serializer.serialize_f64(*value),
        }
    }
}

impl<'de> Deserialize<'de> for Gamma {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Keyword(String),
            Value(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Keyword(keyword) if keyword == "scale" => Ok(Gamma::Scale),
            Raw::Keyword(keyword) => Err(serde::de::Error::custom(format!(
                "expected \"scale\" or a number, got {keyword:?}"
            ))),
            Raw::Value(value) => Ok(Gamma::Value(value)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Worker threads; `None` uses one per CPU
    pub jobs: Option<usize>,
}

impl PipelineConfig {
    /// Reads `path` as JSON. An unreadable or malformed file is logged and
    /// replaced by the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::read_json(path) {
            Ok(config) => {
                log::info!("Using configuration from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!("Ignoring configuration {} ({}); running with built-in settings", path.display(), err);
                Self::default()
            }
        }
    }

    fn read_json(path: &Path) -> crate::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
