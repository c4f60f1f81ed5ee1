// Engine configuration - timing, clock and playback defaults
// Stored as RON, every field optional

use crate::clock::ClockType;
use crate::sequencer::timeline::NoteValue;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far ahead of the audio clock events are dispatched (seconds)
    pub look_ahead_secs: f64,
    /// Clock tick interval (seconds)
    pub schedule_ahead_secs: f64,
    /// Preferred tick primitive
    pub clock_type: ClockType,
    /// Device buffer size assumed when the host does not report one (frames)
    pub buffer_size: usize,
    /// Grid step length
    pub step_value: NoteValue,
    /// Gap left between a note's release and the next step, as a fraction of a step
    pub release_gap_steps: f64,
    /// Tempo used when the roll does not provide one
    pub default_bpm: f64,
    /// MIDI output port name (first available port when unset)
    pub midi_port: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            look_ahead_secs: 0.05,
            schedule_ahead_secs: 0.025,
            clock_type: ClockType::Worker,
            buffer_size: 128,
            step_value: NoteValue::Eighth,
            // A 32nd note at the default eighth-note grid
            release_gap_steps: 0.25,
            default_bpm: 90.0,
            midi_port: None,
        }
    }
}

impl EngineConfig {
    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.default_bpm.is_finite() && self.default_bpm > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "default_bpm must be positive, got {}",
                self.default_bpm
            )));
        }
        if !(0.0..1.0).contains(&self.release_gap_steps) {
            return Err(ConfigError::Invalid(format!(
                "release_gap_steps must be in [0, 1), got {}",
                self.release_gap_steps
            )));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be > 0".to_string()));
        }
        Ok(())
    }
}
