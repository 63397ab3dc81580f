use ndarray::{Array1, Array2, Axis};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::audio_processor::Waveform;
use crate::config::FeatureConfig;
use crate::embedding::{EmbeddingModel, OnnxEmbedding};
use crate::{AccentError, Result};

/// Fixed-length per-waveform feature vector.
pub type FeatureVector = Array1<f64>;

const POWER_FLOOR: f32 = 1e-10;
const TOP_DB: f32 = 80.0;
const SILENCE_PEAK: f32 = 1e-8;

pub struct MfccExtractor {
    sample_rate: u32,
    n_mfcc: usize,
    n_fft: usize,
    hop_length: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    mel_filters: Array2<f32>,
    dct: Array2<f32>,
}

impl MfccExtractor {
    pub fn new(sample_rate: u32, config: &FeatureConfig) -> Result<Self> {
        if config.n_mfcc == 0 || config.n_fft == 0 || config.hop_length == 0 {
            return Err(AccentError::Extraction(format!(
                "invalid MFCC parameters: n_mfcc={}, n_fft={}, hop_length={}",
                config.n_mfcc, config.n_fft, config.hop_length
            )));
        }
        if config.n_mfcc > config.n_mels {
            return Err(AccentError::Extraction(format!(
                "n_mfcc ({}) cannot exceed n_mels ({})",
                config.n_mfcc, config.n_mels
            )));
        }

        let fft = FftPlanner::new().plan_fft_forward(config.n_fft);

        // Periodic Hann window
        let window = (0..config.n_fft)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / config.n_fft as f32).cos())
            .collect();

        Ok(Self {
            sample_rate,
            n_mfcc: config.n_mfcc,
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            fft,
            window,
            mel_filters: mel_filter_bank(sample_rate as f32, config.n_fft, config.n_mels),
            dct: dct_matrix(config.n_mfcc, config.n_mels),
        })
    }

    pub fn n_mfcc(&self) -> usize {
        self.n_mfcc
    }

    /// Mean of each MFCC coefficient over time.
    pub fn extract_features(&self, waveform: &Waveform) -> Result<FeatureVector> {
        if waveform.sample_rate != self.sample_rate {
            return Err(AccentError::Extraction(format!(
                "waveform is {} Hz, extractor expects {} Hz",
                waveform.sample_rate, self.sample_rate
            )));
        }
        let audio = &waveform.samples;
        if audio.is_empty() {
            return Err(AccentError::Extraction("empty waveform".into()));
        }
        if audio.iter().any(|s| !s.is_finite()) {
            return Err(AccentError::Extraction("waveform contains NaN or infinite samples".into()));
        }
        if audio.iter().all(|s| s.abs() < SILENCE_PEAK) {
            return Err(AccentError::Extraction("waveform is silent".into()));
        }

        let mfccs = self.compute_mfcc(audio);
        let means = mfccs
            .mean_axis(Axis(1))
            .ok_or_else(|| AccentError::Extraction("no frames to average".into()))?;

        let features: FeatureVector = means.mapv(f64::from);
        if features.iter().any(|v| !v.is_finite()) {
            return Err(AccentError::Extraction("MFCC means are not finite".into()));
        }

        Ok(features)
    }

    fn compute_mfcc(&self, audio: &[f32]) -> Array2<f32> {
        let spectrogram = self.compute_spectrogram(audio);
        let mel_spectrogram = self.mel_filters.dot(&spectrogram);
        let log_mel = power_to_db(&mel_spectrogram);
        self.dct.dot(&log_mel)
    }

    // Frames are centred, so the signal is zero-padded by n_fft / 2 on both sides.
    fn compute_spectrogram(&self, audio: &[f32]) -> Array2<f32> {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; audio.len() + 2 * pad];
        padded[pad..pad + audio.len()].copy_from_slice(audio);

        let n_frames = 1 + (padded.len() - self.n_fft) / self.hop_length;
        let n_freqs = self.n_fft / 2 + 1;
        let mut spectrogram = Array2::zeros((n_freqs, n_frames));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for frame_idx in 0..n_frames {
            let start = frame_idx * self.hop_length;
            let frame = &padded[start..start + self.n_fft];
            for ((slot, &sample), &w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *slot = Complex::new(sample * w, 0.0);
            }

            self.fft.process(&mut buffer);

            for (bin, value) in buffer.iter().take(n_freqs).enumerate() {
                spectrogram[[bin, frame_idx]] = value.norm_sqr();
            }
        }

        spectrogram
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters with area normalisation, shape `(n_mels, n_fft / 2 + 1)`.
fn mel_filter_bank(sample_rate: f32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let mut filters = Array2::zeros((n_mels, n_freqs));

    let mel_high = hz_to_mel(sample_rate / 2.0);
    let hz_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_high * i as f32 / (n_mels + 1) as f32))
        .collect();
    let bin_hz: Vec<f32> = (0..n_freqs)
        .map(|k| k as f32 * sample_rate / n_fft as f32)
        .collect();

    for m in 0..n_mels {
        let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
        let norm = 2.0 / (right - left);
        for (k, &freq) in bin_hz.iter().enumerate() {
            let rising = (freq - left) / (center - left);
            let falling = (right - freq) / (right - center);
            let weight = rising.min(falling).max(0.0);
            if weight > 0.0 {
                filters[[m, k]] = weight * norm;
            }
        }
    }

    filters
}

/// Orthonormal DCT-II basis, shape `(n_mfcc, n_mels)`.
fn dct_matrix(n_mfcc: usize, n_mels: usize) -> Array2<f32> {
    let n = n_mels as f32;
    Array2::from_shape_fn((n_mfcc, n_mels), |(k, j)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        scale * (PI * k as f32 * (2.0 * j as f32 + 1.0) / (2.0 * n)).cos()
    })
}

fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    let db = power.mapv(|x| 10.0 * x.max(POWER_FLOOR).log10());
    let peak = db.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;
    db.mapv(|x| x.max(floor))
}

/// MFCC means, optionally followed by a pretrained speech embedding.
///
/// The layout of the produced vector must match what the scaler and
/// classifier were fit on, so extraction and inference share one instance
/// built from the same [`FeatureConfig`].
pub struct FeatureExtractor {
    mfcc: MfccExtractor,
    embedding: Option<Box<dyn EmbeddingModel>>,
}

impl FeatureExtractor {
    pub fn new(mfcc: MfccExtractor, embedding: Option<Box<dyn EmbeddingModel>>) -> Self {
        Self { mfcc, embedding }
    }

    pub fn from_config(sample_rate: u32, config: &FeatureConfig) -> Result<Self> {
        let mfcc = MfccExtractor::new(sample_rate, config)?;
        let embedding = match &config.embedding {
            Some(embedding) => {
                let model = OnnxEmbedding::load(&embedding.model_path, embedding.dimension)?;
                Some(Box::new(model) as Box<dyn EmbeddingModel>)
            }
            None => None,
        };
        Ok(Self::new(mfcc, embedding))
    }

    pub fn dimension(&self) -> usize {
        self.mfcc.n_mfcc() + self.embedding.as_ref().map_or(0, |e| e.dimension())
    }

    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureVector> {
        let mfcc = self.mfcc.extract_features(waveform)?;
        let Some(model) = &self.embedding else {
            return Ok(mfcc);
        };

        let embedding = model.embed(waveform)?;
        if embedding.len() != model.dimension() {
            return Err(AccentError::DimensionMismatch {
                expected: model.dimension(),
                got: embedding.len(),
            });
        }

        let mut features = Vec::with_capacity(self.dimension());
        features.extend(mfcc.iter().copied());
        features.extend(embedding.iter().map(|&x| f64::from(x)));
        Ok(Array1::from(features))
    }
}
