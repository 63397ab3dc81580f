pub mod artifacts;
pub mod audio_processor;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod embedding;
pub mod encoder;
pub mod error;
pub mod feature_extractor;
pub mod feature_store;
pub mod metrics;
pub mod prediction_log;
pub mod predictor;
pub mod recommendations;
pub mod recorder;
pub mod scaler;
pub mod service;
pub mod trainer;

pub use artifacts::{FeatureManifest, ModelArtifacts};
pub use audio_processor::{AudioProcessor, Waveform};
pub use batch::{BatchExtractor, ClassOutcome, ExtractionReport};
pub use classifier::Classifier;
pub use config::PipelineConfig;
pub use encoder::ClassEncoder;
pub use error::AccentError;
pub use feature_extractor::{FeatureExtractor, FeatureVector, MfccExtractor};
pub use feature_store::{FeatureStore, LabeledDataset};
pub use metrics::ClassificationReport;
pub use prediction_log::{PredictionLog, PredictionSource};
pub use predictor::{Prediction, Predictor};
pub use recorder::Recorder;
pub use scaler::StandardScaler;
pub use service::PredictionService;
pub use trainer::{Trainer, TrainingOutcome};

pub type Result<T> = std::result::Result<T, AccentError>;
