use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the extraction, training and prediction pipeline.
#[derive(Debug, Error)]
pub enum AccentError {
    /// The source could not be decoded as audio
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("resampling failed: {0}")]
    Resample(String),

    /// The waveform is shorter than the configured minimum
    #[error("audio too short: {duration_secs:.2}s is below the {min_secs:.2}s minimum")]
    TooShort { duration_secs: f32, min_secs: f32 },

    /// MFCC computation failed
    #[error("feature extraction failed: {0}")]
    Extraction(String),

    /// Pretrained embedding model failed to load or run
    #[error("embedding model error: {0}")]
    Embedding(String),

    /// Feature vector length disagrees with the fitted scaler or classifier
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// No labeled samples were available for training
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("training needs at least two distinct classes, found {found}")]
    TooFewClasses { found: usize },

    /// A persisted artifact is missing, corrupt or inconsistent
    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("unknown class label: {0}")]
    UnknownLabel(String),

    #[error("class index {0} is out of range")]
    UnknownClassIndex(usize),

    /// Microphone or audio host failure
    #[error("audio device error: {0}")]
    Device(String),

    #[error("recording cancelled")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<hound::Error> for AccentError {
    fn from(err: hound::Error) -> Self {
        AccentError::Decode(err.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for AccentError {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        AccentError::Resample(err.to_string())
    }
}

impl From<rubato::ResampleError> for AccentError {
    fn from(err: rubato::ResampleError) -> Self {
        AccentError::Resample(err.to_string())
    }
}

impl AccentError {
    /// Whether a failed request leaves the process usable for the next one.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AccentError::ArtifactLoad { .. } | AccentError::EmptyTrainingSet | AccentError::TooFewClasses { .. }
        )
    }
}
