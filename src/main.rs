use accent_identifier::audio_processor::write_wav;
use accent_identifier::batch::ClassOutcome;
use accent_identifier::prediction_log::export_result;
use accent_identifier::recommendations::cuisine_for;
use accent_identifier::{
    AccentError, AudioProcessor, BatchExtractor, FeatureExtractor, FeatureManifest, FeatureStore,
    PipelineConfig, Prediction, PredictionLog, PredictionService, PredictionSource, Recorder, Trainer,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "accent-id", about = "Accent / language identification from speech")]
struct Cli {
    /// JSON configuration file; defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract features for every class folder not yet in the store
    Extract {
        /// Dataset root with one subfolder of WAV files per class
        #[arg(long, default_value = "data")]
        data: PathBuf,
        #[arg(long, default_value = "features")]
        features: PathBuf,
    },
    /// Train a classifier on the stored features and save the model
    Train {
        #[arg(long, default_value = "features")]
        features: PathBuf,
        #[arg(long, default_value = "models")]
        models: PathBuf,
    },
    /// Predict the accent of one recording
    Predict {
        #[arg(long, default_value = "models")]
        models: PathBuf,
        /// Prediction log to append to
        #[arg(long, default_value = "user_predictions.csv")]
        log: PathBuf,
        #[arg(long)]
        no_log: bool,
        /// Also write the result as a standalone CSV
        #[arg(long)]
        export: Option<PathBuf>,
        #[command(subcommand)]
        input: Input,
    },
}

#[derive(Subcommand)]
enum Input {
    /// Classify a WAV file
    File { path: PathBuf },
    /// Record from the default microphone
    Record {
        /// Capture length in seconds
        #[arg(long)]
        duration: Option<f32>,
        /// Keep the recording as a WAV file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::load_from_file(path),
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Extract { data, features } => extract(&config, &data, &features)?,
        Command::Train { features, models } => train(&config, &features, &models)?,
        Command::Predict {
            models,
            log,
            no_log,
            export,
            input,
        } => {
            let log = (!no_log).then(|| PredictionLog::new(log));
            let service = PredictionService::from_config(&config, &models, log)
                .with_context(|| format!("Failed to load model from {}", models.display()))?;
            return predict(&config, &service, input, export.as_deref()).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn extract(config: &PipelineConfig, data: &Path, features: &Path) -> anyhow::Result<()> {
    let store = FeatureStore::open(features)
        .with_context(|| format!("Failed to open feature store {}", features.display()))?;
    let audio = AudioProcessor::new(config.audio.sample_rate, config.audio.min_duration_secs);
    let extractor = FeatureExtractor::from_config(config.audio.sample_rate, &config.features)
        .context("Failed to build feature extractor")?;

    let batch = BatchExtractor::new(audio, extractor, config.extraction.jobs)?;
    let report = batch
        .run(data, &store)
        .with_context(|| format!("Failed to extract features from {}", data.display()))?;

    for class in &report.classes {
        match &class.outcome {
            ClassOutcome::AlreadyPresent => println!("{:<20} skipped (already processed)", class.label),
            ClassOutcome::Extracted { samples, skipped_files } => {
                println!("{:<20} {} samples, {} skipped", class.label, samples, skipped_files.len())
            }
        }
    }
    println!(
        "\n{} classes extracted, {} already present",
        report.written(),
        report.already_present()
    );
    Ok(())
}

fn train(config: &PipelineConfig, features: &Path, models: &Path) -> anyhow::Result<()> {
    let store = FeatureStore::open(features)
        .with_context(|| format!("Failed to open feature store {}", features.display()))?;
    let dataset = store.load_training_set().context("Failed to load training set")?;

    let manifest = FeatureManifest::new(config.audio.sample_rate, &config.features);
    let outcome = Trainer::new(config.training.clone())
        .train(&dataset, manifest)
        .context("Training failed")?;

    println!("Classification Report:\n");
    println!("{}", outcome.report);
    println!("Accuracy: {:.4}", outcome.report.accuracy);

    outcome
        .artifacts
        .save(models)
        .with_context(|| format!("Failed to save model to {}", models.display()))?;
    println!("\nModel saved to {}", models.display());
    Ok(())
}

async fn predict(
    config: &PipelineConfig,
    service: &PredictionService,
    input: Input,
    export: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let (result, source) = match input {
        Input::File { path } => {
            info!("Processing audio file: {}", path.display());
            (service.predict_file(&path), PredictionSource::Uploaded)
        }
        Input::Record { duration, save } => {
            let seconds = duration.unwrap_or(config.audio.record_duration_secs);
            let Some(length) = record_duration(seconds) else {
                println!("Invalid recording duration {seconds}: expected a positive number of seconds");
                return Ok(ExitCode::FAILURE);
            };
            println!("Speak now... (recording for {seconds:.1} seconds)");
            let recorder = Recorder::new(service.audio_processor().clone());
            let result = match recorder.record(length).await {
                Ok(waveform) => {
                    if let Some(path) = &save {
                        write_wav(path, &waveform)
                            .with_context(|| format!("Failed to save recording to {}", path.display()))?;
                    }
                    service.predict_waveform(&waveform, PredictionSource::Recorded)
                }
                Err(err) => Err(err),
            };
            (result, PredictionSource::Recorded)
        }
    };

    match result {
        Ok(prediction) => {
            print_prediction(&prediction);
            if let Some(path) = export {
                export_result(path, source, &prediction)
                    .with_context(|| format!("Failed to export result to {}", path.display()))?;
                println!("Result written to {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.is_recoverable() => {
            match err {
                AccentError::TooShort { .. } => println!("Audio too short! Please record at least 1 second."),
                other => println!("Prediction failed: {other}"),
            }
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_prediction(prediction: &Prediction) {
    println!("\n=== RESULT ===");
    println!("Predicted Accent/Language: {}", prediction.label);
    println!("Confidence: {:.2}%", prediction.confidence);

    match cuisine_for(&prediction.label) {
        Some(dishes) => println!(
            "\nSince the detected accent/language is {}, you might enjoy trying: {}",
            prediction.label,
            dishes.join(", ")
        ),
        None => println!("\nCuisine suggestion not available for this accent/language yet."),
    }
}

fn record_duration(seconds: f32) -> Option<Duration> {
    Duration::try_from_secs_f32(seconds).ok().filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_duration() {
        assert_eq!(record_duration(3.0), Some(Duration::from_secs(3)));
        assert_eq!(record_duration(0.5), Some(Duration::from_millis(500)));
        assert_eq!(record_duration(0.0), None);
        assert_eq!(record_duration(-1.0), None);
        assert_eq!(record_duration(f32::NAN), None);
        assert_eq!(record_duration(f32::INFINITY), None);
        assert_eq!(record_duration(1e30), None);
    }
}
