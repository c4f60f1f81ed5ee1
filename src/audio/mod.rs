// Module audio - audio device backend and the global audio clock

pub mod device;
pub mod timing;

pub use device::AudioDevice;
pub use timing::{AudioClock, AudioTiming, ManualClock, SystemClock};

/// Audio backend errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No audio device found")]
    NoDevice,

    #[error("Audio configuration error: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}
