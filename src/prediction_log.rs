use chrono::{DateTime, Local};
use std::borrow::Cow;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::predictor::Prediction;
use crate::Result;

const LOG_HEADER: &str = "timestamp,source,predicted_label,confidence";
const EXPORT_HEADER: &str = "Source,Predicted Accent/Language,Confidence (%)";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where the audio of a prediction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionSource {
    Uploaded,
    Recorded,
}

impl fmt::Display for PredictionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionSource::Uploaded => write!(f, "Uploaded"),
            PredictionSource::Recorded => write!(f, "Recorded"),
        }
    }
}

#[derive(Debug)]
pub struct PredictionLog {
    path: PathBuf,
    // Serialises appends from concurrent requests
    lock: Mutex<()>,
}

impl PredictionLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, source: PredictionSource, prediction: &Prediction) -> Result<()> {
        self.append_at(Local::now(), source, prediction)
    }

    fn append_at(&self, timestamp: DateTime<Local>, source: PredictionSource, prediction: &Prediction) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{LOG_HEADER}")?;
        }
        writeln!(
            file,
            "{},{},{},{:.2}",
            timestamp.format(TIMESTAMP_FORMAT),
            source,
            csv_field(&prediction.label),
            prediction.confidence
        )?;
        Ok(())
    }
}

/// Writes one prediction as a standalone two-line CSV document.
pub fn export_result<P: AsRef<Path>>(path: P, source: PredictionSource, prediction: &Prediction) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{EXPORT_HEADER}")?;
    writeln!(
        file,
        "{},{},{:.2}",
        source,
        csv_field(&prediction.label),
        prediction.confidence
    )?;
    Ok(())
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
