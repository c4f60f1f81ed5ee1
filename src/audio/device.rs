// Audio device - CPAL output stream used as the hardware audio clock
// The stream renders silence; its callback cadence is what drives audio time

use super::AudioError;
use super::timing::{AudioClock, AudioTiming};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};

/// Opened output device whose callback advances an [`AudioTiming`]
///
/// The stream must stay alive for the clock to advance, so keep this value
/// around for as long as playback may happen.
pub struct AudioDevice {
    _device: Device,
    _stream: Stream,
    name: String,
    timing: AudioTiming,
}

impl AudioDevice {
    /// Open the default output device
    ///
    /// `fallback_buffer_size` is reported when the host does not expose a
    /// fixed buffer size.
    pub fn open_default(fallback_buffer_size: usize) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f64;
        let channels = supported_config.channels() as usize;

        let config: StreamConfig = supported_config.into();
        let buffer_frames = match config.buffer_size {
            cpal::BufferSize::Fixed(size) => size as usize,
            cpal::BufferSize::Default => fallback_buffer_size,
        };

        log::debug!(
            "audio device '{}': {} Hz, {} channels, {:?}, {} frames",
            name,
            sample_rate,
            channels,
            sample_format,
            buffer_frames
        );

        let timing = AudioTiming::new(sample_rate, buffer_frames);

        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, channels, timing.clone())
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, channels, timing.clone())
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, channels, timing.clone())
            }
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok(Self {
            _device: device,
            _stream: stream,
            name,
            timing,
        })
    }

    /// Build a silent output stream that counts rendered frames
    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        timing: AudioTiming,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + Send + 'static,
    {
        let channels = channels.max(1);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // No allocations, no locks: fill silence and count frames
                    for sample in data.iter_mut() {
                        *sample = T::EQUILIBRIUM;
                    }
                    timing.advance(data.len() / channels);
                },
                |err| log::warn!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clock handle driven by this device
    pub fn timing(&self) -> AudioTiming {
        self.timing.clone()
    }
}

impl AudioClock for AudioDevice {
    fn now(&self) -> f64 {
        self.timing.now()
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.timing.resume()
    }

    fn is_running(&self) -> bool {
        self.timing.is_running()
    }

    fn sample_rate(&self) -> f64 {
        self.timing.sample_rate()
    }

    fn buffer_size(&self) -> usize {
        self.timing.buffer_size()
    }
}
