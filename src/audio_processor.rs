use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{FftFixedInOut, Resampler};
use std::io::{Cursor, Read};
use std::path::Path;

use crate::{AccentError, Result};

const RESAMPLE_CHUNK: usize = 1024;

/// Mono audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decodes WAV audio into mono waveforms at the target rate.
#[derive(Debug, Clone)]
pub struct AudioProcessor {
    target_sample_rate: u32,
    min_duration_secs: f32,
}

impl AudioProcessor {
    pub fn new(target_sample_rate: u32, min_duration_secs: f32) -> Self {
        Self {
            target_sample_rate,
            min_duration_secs,
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn load_audio_file<P: AsRef<Path>>(&self, path: P) -> Result<Waveform> {
        let reader = WavReader::open(path)?;
        self.decode(reader)
    }

    /// Decodes an in-memory WAV buffer such as an upload.
    pub fn load_audio_bytes(&self, bytes: &[u8]) -> Result<Waveform> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        self.decode(reader)
    }

    /// Converts interleaved samples captured elsewhere (e.g. a microphone).
    pub fn from_interleaved(&self, data: &[f32], channels: u16, sample_rate: u32) -> Result<Waveform> {
        if channels == 0 || sample_rate == 0 {
            return Err(AccentError::Decode(format!(
                "invalid stream layout: {} channels at {} Hz",
                channels, sample_rate
            )));
        }
        let mono = downmix(data, channels as usize);
        Ok(Waveform::new(self.resample(&mono, sample_rate)?, self.target_sample_rate))
    }

    /// Rejects waveforms shorter than the configured minimum.
    pub fn ensure_min_duration(&self, waveform: &Waveform) -> Result<()> {
        let duration_secs = waveform.duration_secs();
        if duration_secs < self.min_duration_secs {
            return Err(AccentError::TooShort {
                duration_secs,
                min_secs: self.min_duration_secs,
            });
        }
        Ok(())
    }

    fn decode<R: Read>(&self, mut reader: WavReader<R>) -> Result<Waveform> {
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(AccentError::Decode(format!(
                "invalid WAV header: {} channels at {} Hz",
                spec.channels, spec.sample_rate
            )));
        }

        let interleaved = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()?,
            SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(AccentError::Decode(format!(
                        "unsupported bits per sample: {}",
                        spec.bits_per_sample
                    )));
                }
                let full_scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|sample| sample as f32 / full_scale))
                    .collect::<std::result::Result<Vec<f32>, _>>()?
            }
        };

        let mono = downmix(&interleaved, spec.channels as usize);
        let samples = self.resample(&mono, spec.sample_rate)?;

        log::debug!(
            "Decoded {} channel(s) at {} Hz into {} samples at {} Hz",
            spec.channels,
            spec.sample_rate,
            samples.len(),
            self.target_sample_rate
        );

        Ok(Waveform::new(samples, self.target_sample_rate))
    }

    // Band-limited FFT resampling; the output is trimmed by the filter delay
    // so it lines up with the input.
    fn resample(&self, audio: &[f32], from_rate: u32) -> Result<Vec<f32>> {
        if from_rate == self.target_sample_rate || audio.is_empty() {
            return Ok(audio.to_vec());
        }

        let mut resampler = FftFixedInOut::<f32>::new(
            from_rate as usize,
            self.target_sample_rate as usize,
            RESAMPLE_CHUNK,
            1,
        )?;
        let delay = resampler.output_delay();
        let expected = ((audio.len() as u64 * self.target_sample_rate as u64 + from_rate as u64 / 2)
            / from_rate as u64) as usize;

        let chunk = resampler.input_frames_next();
        let mut block = vec![0.0f32; chunk];
        let mut output = Vec::with_capacity(expected + delay + resampler.output_frames_next());
        let mut position = 0;

        while output.len() < expected + delay {
            block.fill(0.0);
            if position < audio.len() {
                let end = (position + chunk).min(audio.len());
                block[..end - position].copy_from_slice(&audio[position..end]);
            }
            position += chunk;

            let resampled = resampler.process(&[block.as_slice()], None)?;
            output.extend_from_slice(&resampled[0]);
        }

        Ok(output[delay..delay + expected].to_vec())
    }
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Writes a waveform as 16-bit mono PCM, e.g. to keep a recording for playback.
pub fn write_wav<P: AsRef<Path>>(path: P, waveform: &Waveform) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in &waveform.samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
