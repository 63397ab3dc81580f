use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use log::{error, info};
use ringbuf::{HeapProducer, HeapRb};
use std::time::Duration;

use crate::audio_processor::{AudioProcessor, Waveform};
use crate::{AccentError, Result};

/// Fixed-length capture from the default input device.
pub struct Recorder {
    audio_processor: AudioProcessor,
}

impl Recorder {
    pub fn new(audio_processor: AudioProcessor) -> Self {
        Self { audio_processor }
    }

    /// Records for `duration` and returns a mono waveform at the target rate.
    ///
    /// Ctrl-C before the duration elapses stops the capture and yields
    /// [`AccentError::Cancelled`].
    pub async fn record(&self, duration: Duration) -> Result<Waveform> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AccentError::Device("no input device available".to_owned()))?;

        info!("Using input device: {}", device.name().map_err(device_error)?);

        let supported = device.default_input_config().map_err(device_error)?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels;
        let source_rate = config.sample_rate.0;

        // One extra second of headroom for callback jitter
        let capacity = (source_rate as f64 * channels as f64 * (duration.as_secs_f64() + 1.0)) as usize;
        let (producer, mut consumer) = HeapRb::<f32>::new(capacity.max(1)).split();

        let stream = build_input_stream(&device, &config, sample_format, producer)?;
        stream.play().map_err(device_error)?;
        info!("Recording for {:.1}s", duration.as_secs_f32());

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Recording cancelled");
                return Err(AccentError::Cancelled);
            }
        }
        drop(stream);

        let captured: Vec<f32> = consumer.pop_iter().collect();
        info!(
            "Captured {} frames at {} Hz ({} channels)",
            captured.len() / channels.max(1) as usize,
            source_rate,
            channels
        );

        self.audio_processor.from_interleaved(&captured, channels, source_rate)
    }
}

fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    mut producer: HeapProducer<f32>,
) -> Result<Stream> {
    let on_error = |err: cpal::StreamError| error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                producer.push_slice(data);
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    if producer.push(sample as f32 / i16::MAX as f32).is_err() {
                        break;
                    }
                }
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    if producer.push((sample as f32 - 32768.0) / 32768.0).is_err() {
                        break;
                    }
                }
            },
            on_error,
            None,
        ),
        other => {
            return Err(AccentError::Device(format!("unsupported sample format: {other:?}")));
        }
    };

    stream.map_err(device_error)
}

fn device_error(err: impl std::fmt::Display) -> AccentError {
    AccentError::Device(err.to_string())
}
