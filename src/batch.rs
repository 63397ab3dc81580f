use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::audio_processor::AudioProcessor;
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::feature_store::FeatureStore;
use crate::{AccentError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassOutcome {
    /// The store already held this class
    AlreadyPresent,
    Extracted {
        samples: usize,
        skipped_files: Vec<SkippedFile>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassReport {
    pub label: String,
    pub outcome: ClassOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub classes: Vec<ClassReport>,
}

impl ExtractionReport {
    /// Number of collections written during this run.
    pub fn written(&self) -> usize {
        self.classes
            .iter()
            .filter(|c| matches!(c.outcome, ClassOutcome::Extracted { .. }))
            .count()
    }

    pub fn already_present(&self) -> usize {
        self.classes.len() - self.written()
    }
}

pub struct BatchExtractor {
    audio: AudioProcessor,
    features: FeatureExtractor,
    pool: rayon::ThreadPool,
}

impl BatchExtractor {
    /// `jobs` limits the worker count; `None` uses one worker per CPU.
    pub fn new(audio: AudioProcessor, features: FeatureExtractor, jobs: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("extract-{i}"));
        if let Some(jobs) = jobs {
            builder = builder.num_threads(jobs.max(1));
        }
        Ok(Self {
            audio,
            features,
            pool: builder.build()?,
        })
    }

    pub fn run(&self, audio_root: &Path, store: &FeatureStore) -> Result<ExtractionReport> {
        let mut report = ExtractionReport::default();

        for (label, class_dir) in class_directories(audio_root)? {
            if store.contains(&label) {
                log::info!("Skipping {} (already processed)", label);
                report.classes.push(ClassReport {
                    label,
                    outcome: ClassOutcome::AlreadyPresent,
                });
                continue;
            }

            let started = Instant::now();
            let files = wav_files(&class_dir)?;
            log::info!("Processing class {} ({} files)", label, files.len());

            let results: Vec<(PathBuf, Result<FeatureVector>)> = self.pool.install(|| {
                files
                    .into_par_iter()
                    .map(|path| {
                        let result = self.extract_file(&path);
                        (path, result)
                    })
                    .collect()
            });

            let mut vectors = Vec::with_capacity(results.len());
            let mut skipped_files = Vec::new();
            for (path, result) in results {
                match result {
                    Ok(vector) => vectors.push(vector),
                    Err(err) if !concerns_single_file(&err) => {
                        log::error!("Aborting class {} at {}: {}", label, path.display(), err);
                        return Err(err);
                    }
                    Err(err) => {
                        log::warn!("Skipped {}: {}", path.display(), err);
                        skipped_files.push(SkippedFile {
                            path,
                            reason: err.to_string(),
                        });
                    }
                }
            }

            store.write_class(&label, &vectors)?;
            log::info!(
                "{}: {} samples processed, {} skipped in {:.1}s",
                label,
                vectors.len(),
                skipped_files.len(),
                started.elapsed().as_secs_f32()
            );

            report.classes.push(ClassReport {
                label,
                outcome: ClassOutcome::Extracted {
                    samples: vectors.len(),
                    skipped_files,
                },
            });
        }

        Ok(report)
    }

    fn extract_file(&self, path: &Path) -> Result<FeatureVector> {
        let waveform = self.audio.load_audio_file(path)?;
        self.audio.ensure_min_duration(&waveform)?;
        self.features.extract(&waveform)
    }
}

// Anything else (model, disk, pool) would fail every file alike, so the
// class must not be recorded as done.
fn concerns_single_file(err: &AccentError) -> bool {
    matches!(
        err,
        AccentError::Decode(_)
            | AccentError::Resample(_)
            | AccentError::TooShort { .. }
            | AccentError::Extraction(_)
            | AccentError::DimensionMismatch { .. }
    )
}

/// Class subfolders of the dataset root, sorted by name.
fn class_directories(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut classes = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            classes.push((name.to_owned(), path));
        }
    }
    classes.sort();
    Ok(classes)
}

fn wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if path.is_file() && is_wav {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
