use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::feature_extractor::FeatureVector;
use crate::{AccentError, Result};

const EXTENSION: &str = "json";

/// All vectors extracted for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub label: String,
    pub vectors: Vec<Vec<f64>>,
}

/// The aggregated training matrix and its parallel label vector.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub features: Array2<f64>,
    pub labels: Vec<String>,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FeatureStore {
    root: PathBuf,
}

impl FeatureStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, label: &str) -> bool {
        self.class_path(label).is_file()
    }

    /// Persists the vectors of a class that has not been stored yet.
    ///
    /// Returns `Ok(false)` without touching the disk when the class is already present.
    pub fn write_class(&self, label: &str, vectors: &[FeatureVector]) -> Result<bool> {
        if self.contains(label) {
            return Ok(false);
        }

        let collection = FeatureCollection {
            label: label.to_owned(),
            vectors: vectors.iter().map(|v| v.to_vec()).collect(),
        };

        // Write beside the target first so an interrupted run never leaves a
        // partial document that would be mistaken for a finished class.
        let staging = self.root.join(format!(".{label}.{EXTENSION}.partial"));
        {
            let file = File::create(&staging)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &collection)?;
            writer.flush()?;
        }

        fs::rename(&staging, self.class_path(label))?;

        log::info!("Stored {} vectors for class {}", vectors.len(), label);
        Ok(true)
    }

    pub fn read_class(&self, label: &str) -> Result<FeatureCollection> {
        let file = File::open(self.class_path(label))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Labels of every stored class, sorted.
    pub fn classes(&self) -> Result<Vec<String>> {
        let mut labels = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            labels.push(stem.to_owned());
        }
        labels.sort();
        Ok(labels)
    }

    /// Concatenates every stored class into a training matrix.
    ///
    /// Empty classes are skipped with a warning. All vectors must share one
    /// length; a disagreement is a [`AccentError::DimensionMismatch`].
    pub fn load_training_set(&self) -> Result<LabeledDataset> {
        let mut rows: Vec<f64> = Vec::new();
        let mut labels = Vec::new();
        let mut dimension: Option<usize> = None;

        for label in self.classes()? {
            let collection = self.read_class(&label)?;
            if collection.vectors.is_empty() {
                log::warn!("Skipping {} (empty)", label);
                continue;
            }
            log::info!("Loaded {}: {} samples", label, collection.vectors.len());

            for vector in collection.vectors {
                let expected = *dimension.get_or_insert(vector.len());
                if vector.len() != expected {
                    return Err(AccentError::DimensionMismatch {
                        expected,
                        got: vector.len(),
                    });
                }
                rows.extend(vector);
                labels.push(collection.label.clone());
            }
        }

        let features = Array2::from_shape_vec((labels.len(), dimension.unwrap_or(0)), rows)
            .map_err(|e| AccentError::Extraction(format!("malformed feature matrix: {e}")))?;

        Ok(LabeledDataset { features, labels })
    }

    fn class_path(&self, label: &str) -> PathBuf {
        self.root.join(format!("{label}.{EXTENSION}"))
    }
}
