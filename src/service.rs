use std::path::Path;

use crate::artifacts::{FeatureManifest, ModelArtifacts};
use crate::audio_processor::{AudioProcessor, Waveform};
use crate::config::PipelineConfig;
use crate::feature_extractor::FeatureExtractor;
use crate::prediction_log::{PredictionLog, PredictionSource};
use crate::predictor::{Prediction, Predictor};
use crate::{AccentError, Result};

pub struct PredictionService {
    audio: AudioProcessor,
    features: FeatureExtractor,
    predictor: Predictor,
    log: Option<PredictionLog>,
}

impl PredictionService {
    /// Fails with [`AccentError::DimensionMismatch`] when the extractor does
    /// not produce vectors of the length the model was trained on.
    pub fn new(
        audio: AudioProcessor,
        features: FeatureExtractor,
        predictor: Predictor,
        log: Option<PredictionLog>,
    ) -> Result<Self> {
        let expected = predictor.artifacts().manifest.dimension();
        if features.dimension() != expected {
            return Err(AccentError::DimensionMismatch {
                expected,
                got: features.dimension(),
            });
        }
        Ok(Self {
            audio,
            features,
            predictor,
            log,
        })
    }

    // The configured feature settings must equal the ones recorded at training time.
    pub fn from_config(config: &PipelineConfig, model_dir: &Path, log: Option<PredictionLog>) -> Result<Self> {
        let artifacts = ModelArtifacts::load(model_dir)?;

        let configured = FeatureManifest::new(config.audio.sample_rate, &config.features);
        if configured != artifacts.manifest {
            return Err(AccentError::ArtifactLoad {
                path: model_dir.to_path_buf(),
                reason: format!(
                    "model was trained with {:?} but the configuration gives {:?}",
                    artifacts.manifest, configured
                ),
            });
        }

        let audio = AudioProcessor::new(config.audio.sample_rate, config.audio.min_duration_secs);
        let features = FeatureExtractor::from_config(config.audio.sample_rate, &config.features)?;
        Self::new(audio, features, Predictor::new(artifacts), log)
    }

    pub fn audio_processor(&self) -> &AudioProcessor {
        &self.audio
    }

    pub fn classes(&self) -> &[String] {
        self.predictor.artifacts().encoder.classes()
    }

    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<Prediction> {
        let waveform = self.audio.load_audio_file(path)?;
        self.predict_waveform(&waveform, PredictionSource::Uploaded)
    }

    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let waveform = self.audio.load_audio_bytes(bytes)?;
        self.predict_waveform(&waveform, PredictionSource::Uploaded)
    }

    /// Rejects short audio before any feature work, then classifies and
    /// records the result. A log write failure is reported but does not
    /// affect the returned prediction.
    pub fn predict_waveform(&self, waveform: &Waveform, source: PredictionSource) -> Result<Prediction> {
        self.audio.ensure_min_duration(waveform)?;

        let features = self.features.extract(waveform)?;
        let prediction = self.predictor.predict(&features)?;

        if let Some(log) = &self.log {
            if let Err(err) = log.append(source, &prediction) {
                log::warn!("Failed to append to {}: {}", log.path().display(), err);
            }
        }

        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_processor::write_wav;
    use crate::classifier::Classifier;
    use crate::config::{ClassifierConfig, FeatureConfig};
    use crate::encoder::ClassEncoder;
    use crate::feature_extractor::MfccExtractor;
    use crate::scaler::StandardScaler;
    use ndarray::{Array2, Axis};
    use std::fs;

    fn feature_config() -> FeatureConfig {
        FeatureConfig {
            n_mfcc: 13,
            ..FeatureConfig::default()
        }
    }

    fn tone(freq: f32, secs: f32, amplitude: f32) -> Waveform {
        let samples = (0..(secs * 16000.0) as usize)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / 16000.0).sin())
            .collect();
        Waveform::new(samples, 16000)
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(MfccExtractor::new(16000, &feature_config()).unwrap(), None)
    }

    // Low tones are "Hindi", high tones are "Tamil".
    fn trained_predictor() -> Predictor {
        let features = extractor();
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (label, base) in [("Hindi", 200.0), ("Tamil", 2500.0)] {
            for k in 0..6 {
                let vector = features.extract(&tone(base + 15.0 * k as f32, 0.8, 0.3 + 0.05 * k as f32)).unwrap();
                rows.push(vector.insert_axis(Axis(0)));
                labels.push(label);
            }
        }
        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
        let x: Array2<f64> = ndarray::concatenate(Axis(0), &views).unwrap();

        let encoder = ClassEncoder::fit(&labels);
        let scaler = StandardScaler::fit(&x).unwrap();
        let y = encoder.encode_all(&labels).unwrap();
        let classifier =
            Classifier::fit(&ClassifierConfig::default(), scaler.transform(&x).unwrap().view(), &y, 2, 42).unwrap();

        Predictor::new(ModelArtifacts {
            manifest: FeatureManifest::new(16000, &feature_config()),
            encoder,
            scaler,
            classifier,
        })
    }

    fn service(log: Option<PredictionLog>) -> PredictionService {
        PredictionService::new(AudioProcessor::new(16000, 0.5), extractor(), trained_predictor(), log).unwrap()
    }

    #[test]
    fn test_predicts_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("predictions.csv");
        let service = service(Some(PredictionLog::new(&log_path)));

        let prediction = service
            .predict_waveform(&tone(2540.0, 1.2, 0.4), PredictionSource::Recorded)
            .unwrap();
        assert_eq!(prediction.label, "Tamil");
        assert!((0.0..=100.0).contains(&prediction.confidence));

        let contents = fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains(",Recorded,Tamil,"));
    }

    #[test]
    fn test_short_audio_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("predictions.csv");
        let service = service(Some(PredictionLog::new(&log_path)));

        let result = service.predict_waveform(&tone(220.0, 0.3, 0.4), PredictionSource::Recorded);
        assert!(matches!(result, Err(AccentError::TooShort { .. })));
        assert!(!log_path.exists());

        // the service keeps serving after a failed request
        assert!(service
            .predict_waveform(&tone(230.0, 1.0, 0.4), PredictionSource::Recorded)
            .is_ok());
    }

    #[test]
    fn test_upload_bytes_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.wav");
        write_wav(&path, &tone(210.0, 1.0, 0.4)).unwrap();
        let service = service(None);

        let from_file = service.predict_file(&path).unwrap();
        let from_bytes = service.predict_bytes(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(from_file, from_bytes);
        assert_eq!(from_file.label, "Hindi");

        assert!(matches!(
            service.predict_bytes(b"RIFF but not really"),
            Err(AccentError::Decode(_))
        ));
    }

    #[test]
    fn test_unwritable_log_does_not_fail_prediction() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened for appending
        let service = service(Some(PredictionLog::new(dir.path())));
        assert!(service
            .predict_waveform(&tone(2500.0, 1.0, 0.4), PredictionSource::Uploaded)
            .is_ok());
    }

    #[test]
    fn test_extractor_dimension_checked() {
        let other = FeatureConfig {
            n_mfcc: 20,
            ..FeatureConfig::default()
        };
        let features = FeatureExtractor::new(MfccExtractor::new(16000, &other).unwrap(), None);
        let result = PredictionService::new(AudioProcessor::new(16000, 0.5), features, trained_predictor(), None);
        assert!(matches!(
            result,
            Err(AccentError::DimensionMismatch { expected: 13, got: 20 })
        ));
    }

    #[test]
    fn test_from_config_rejects_other_feature_settings() {
        let dir = tempfile::tempdir().unwrap();
        trained_predictor().artifacts().save(dir.path()).unwrap();

        let mut config = PipelineConfig::default();
        config.features = feature_config();
        assert!(PredictionService::from_config(&config, dir.path(), None).is_ok());

        config.features.hop_length = 256;
        assert!(matches!(
            PredictionService::from_config(&config, dir.path(), None),
            Err(AccentError::ArtifactLoad { .. })
        ));
    }
}
