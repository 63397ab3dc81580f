use accent_identifier::audio_processor::write_wav;
use accent_identifier::config::PipelineConfig;
use accent_identifier::{
    AccentError, AudioProcessor, BatchExtractor, FeatureExtractor, FeatureManifest, FeatureStore,
    PredictionLog, PredictionService, PredictionSource, Trainer, Waveform,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;

const SAMPLE_RATE: u32 = 16000;

/// A voiced-sounding signal: a fundamental with two harmonics plus noise.
fn synthetic_voice(rng: &mut StdRng, fundamental: f32, secs: f32) -> Waveform {
    let phase: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let amplitude: f32 = rng.gen_range(0.2..0.5);
    let samples = (0..(secs * SAMPLE_RATE as f32) as usize)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let w = std::f32::consts::TAU * fundamental * t + phase;
            let voiced = w.sin() + 0.5 * (2.0 * w).sin() + 0.25 * (3.0 * w).sin();
            amplitude * 0.5 * voiced + rng.gen_range(-0.01..0.01)
        })
        .collect();
    Waveform::new(samples, SAMPLE_RATE)
}

fn write_dataset(root: &Path, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for (label, low, high) in [("Hindi", 140.0, 220.0), ("Tamil", 900.0, 1300.0)] {
        let dir = root.join(label);
        fs::create_dir_all(&dir).unwrap();
        for k in 0..12 {
            let fundamental = rng.gen_range(low..high);
            let secs = rng.gen_range(0.8..1.2);
            let waveform = synthetic_voice(&mut rng, fundamental, secs);
            write_wav(dir.join(format!("{label}_{k:02}.wav")), &waveform).unwrap();
        }
    }
}

fn extractor(config: &PipelineConfig) -> BatchExtractor {
    let audio = AudioProcessor::new(config.audio.sample_rate, config.audio.min_duration_secs);
    let features = FeatureExtractor::from_config(config.audio.sample_rate, &config.features).unwrap();
    BatchExtractor::new(audio, features, Some(2)).unwrap()
}

#[test]
fn test_extract_train_predict() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let models = dir.path().join("models");
    let log_path = dir.path().join("user_predictions.csv");
    write_dataset(&data, 42);

    let config = PipelineConfig::default();
    let store = FeatureStore::open(dir.path().join("features")).unwrap();
    let batch = extractor(&config);

    let first = batch.run(&data, &store).unwrap();
    assert_eq!(first.written(), 2);
    let second = batch.run(&data, &store).unwrap();
    assert_eq!(second.written(), 0);
    assert_eq!(second.already_present(), 2);

    let dataset = store.load_training_set().unwrap();
    assert_eq!(dataset.len(), 24);
    assert_eq!(dataset.features.ncols(), 40);

    let manifest = FeatureManifest::new(config.audio.sample_rate, &config.features);
    let outcome = Trainer::new(config.training.clone()).train(&dataset, manifest).unwrap();
    assert_eq!(outcome.test_size, 5);
    assert!(outcome.report.accuracy >= 0.8, "{}", outcome.report);
    outcome.artifacts.save(&models).unwrap();

    let service = PredictionService::from_config(&config, &models, Some(PredictionLog::new(&log_path))).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let tamil = synthetic_voice(&mut rng, 1100.0, 1.2);
    let features = FeatureExtractor::from_config(SAMPLE_RATE, &config.features)
        .unwrap()
        .extract(&tamil)
        .unwrap();
    assert_eq!(features.len(), 40);

    let prediction = service.predict_waveform(&tamil, PredictionSource::Recorded).unwrap();
    assert_eq!(prediction.label, "Tamil");
    assert!(prediction.confidence >= 60.0, "confidence {}", prediction.confidence);
    assert!(prediction.confidence <= 100.0);

    let too_short = synthetic_voice(&mut rng, 1100.0, 0.3);
    assert!(matches!(
        service.predict_waveform(&too_short, PredictionSource::Recorded),
        Err(AccentError::TooShort { .. })
    ));

    let log = fs::read_to_string(&log_path).unwrap();
    let rows: Vec<&str> = log.lines().collect();
    assert_eq!(rows.len(), 2, "{log}");
    assert_eq!(rows[0], "timestamp,source,predicted_label,confidence");
    assert!(rows[1].contains(",Recorded,Tamil,"));
}

#[test]
fn test_empty_store_writes_no_model() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let models = dir.path().join("models");
    fs::create_dir_all(&data).unwrap();

    let config = PipelineConfig::default();
    let store = FeatureStore::open(dir.path().join("features")).unwrap();
    let report = extractor(&config).run(&data, &store).unwrap();
    assert!(report.classes.is_empty());

    let dataset = store.load_training_set().unwrap();
    let manifest = FeatureManifest::new(config.audio.sample_rate, &config.features);
    let result = Trainer::new(config.training.clone()).train(&dataset, manifest);

    assert!(matches!(result, Err(AccentError::EmptyTrainingSet)));
    assert!(!models.exists());
    assert!(matches!(
        PredictionService::from_config(&config, &models, None),
        Err(AccentError::ArtifactLoad { .. })
    ));
}
