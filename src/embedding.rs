use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

use crate::audio_processor::Waveform;
use crate::{AccentError, Result};

/// Produces a fixed-size utterance embedding from a waveform.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, waveform: &Waveform) -> Result<Vec<f32>>;

    /// Length of every vector returned by [`EmbeddingModel::embed`].
    fn dimension(&self) -> usize;
}

// Input is the normalised waveform [1, samples]; the first output is
// last_hidden_state [1, frames, hidden].
pub struct OnnxEmbedding {
    session: Mutex<Session>,
    dimension: usize,
}

impl OnnxEmbedding {
    pub fn load<P: AsRef<Path>>(model_path: P, dimension: usize) -> Result<Self> {
        let path = model_path.as_ref();
        let load_error = |e: &dyn std::fmt::Display| {
            AccentError::Embedding(format!("failed to load {}: {}", path.display(), e))
        };

        let session = Session::builder()
            .map_err(|e| load_error(&e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(&e))?
            .commit_from_file(path)
            .map_err(|e| load_error(&e))?;

        log::info!("Loaded embedding model {} ({} dimensions)", path.display(), dimension);

        Ok(Self {
            session: Mutex::new(session),
            dimension,
        })
    }
}

impl EmbeddingModel for OnnxEmbedding {
    fn embed(&self, waveform: &Waveform) -> Result<Vec<f32>> {
        let input = normalize(&waveform.samples);
        let tensor = Tensor::from_array(([1usize, input.len()], input))
            .map_err(|e| AccentError::Embedding(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AccentError::Embedding("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| AccentError::Embedding(e.to_string()))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| AccentError::Embedding(e.to_string()))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

        mean_pool(&dims, data)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Zero mean, unit variance.
fn normalize(samples: &[f32]) -> Vec<f32> {
    let n = samples.len().max(1) as f32;
    let mean = samples.iter().sum::<f32>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    let std = (variance + 1e-7).sqrt();
    samples.iter().map(|s| (s - mean) / std).collect()
}

/// Averages a `[1, frames, hidden]` tensor over frames.
fn mean_pool(dims: &[usize], data: &[f32]) -> Result<Vec<f32>> {
    let (frames, hidden) = match dims {
        [1, frames, hidden] => (*frames, *hidden),
        _ => {
            return Err(AccentError::Embedding(format!(
                "unexpected hidden state shape {:?}",
                dims
            )))
        }
    };
    if frames == 0 || hidden == 0 || data.len() != frames * hidden {
        return Err(AccentError::Embedding(format!(
            "hidden state has {} values for shape {:?}",
            data.len(),
            dims
        )));
    }

    let mut pooled = vec![0.0f32; hidden];
    for frame in data.chunks(hidden) {
        for (acc, &value) in pooled.iter_mut().zip(frame) {
            *acc += value;
        }
    }
    pooled.iter_mut().for_each(|v| *v /= frames as f32);
    Ok(pooled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zero_mean_unit_variance() {
        let normalized = normalize(&[1.0, 2.0, 3.0, 4.0]);
        let mean: f32 = normalized.iter().sum::<f32>() / 4.0;
        let var: f32 = normalized.iter().map(|v| v * v).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_mean_pool_over_frames() {
        let data = [1.0, 10.0, 3.0, 20.0];
        assert_eq!(mean_pool(&[1, 2, 2], &data).unwrap(), vec![2.0, 15.0]);
    }

    #[test]
    fn test_mean_pool_rejects_bad_shape() {
        assert!(mean_pool(&[2, 2], &[0.0; 4]).is_err());
        assert!(mean_pool(&[1, 3, 2], &[0.0; 4]).is_err());
    }
}
