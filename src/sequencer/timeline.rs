// Timeline - Musical time representation
// Converts symbolic note values and grid steps to seconds at a tempo

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tempo in BPM (Beats Per Minute)
/// One beat is a quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    ///
    /// # Panics
    /// If `bpm` is not a positive, finite number.
    pub fn new(bpm: f64) -> Self {
        assert!(Self::is_valid_bpm(bpm), "BPM must be positive and finite");
        Self { bpm }
    }

    /// Check a BPM value before building a tempo from user input
    pub fn is_valid_bpm(bpm: f64) -> bool {
        bpm.is_finite() && bpm > 0.0
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Set BPM value
    ///
    /// # Panics
    /// If `bpm` is not a positive, finite number.
    pub fn set_bpm(&mut self, bpm: f64) {
        assert!(Self::is_valid_bpm(bpm), "BPM must be positive and finite");
        self.bpm = bpm;
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of a note value in seconds
    pub fn note_duration_seconds(&self, value: NoteValue) -> f64 {
        value.beats() * self.beat_duration_seconds()
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Symbolic note duration ("4n" = quarter note)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl NoteValue {
    /// Length in beats (quarter notes)
    pub fn beats(&self) -> f64 {
        match self {
            NoteValue::Whole => 4.0,
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
            NoteValue::ThirtySecond => 0.125,
        }
    }

    pub fn notation(&self) -> &'static str {
        match self {
            NoteValue::Whole => "1n",
            NoteValue::Half => "2n",
            NoteValue::Quarter => "4n",
            NoteValue::Eighth => "8n",
            NoteValue::Sixteenth => "16n",
            NoteValue::ThirtySecond => "32n",
        }
    }
}

impl Default for NoteValue {
    fn default() -> Self {
        NoteValue::Eighth
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notation())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown note value notation: {0}")]
pub struct NoteValueError(pub String);

impl FromStr for NoteValue {
    type Err = NoteValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1n" => Ok(NoteValue::Whole),
            "2n" => Ok(NoteValue::Half),
            "4n" => Ok(NoteValue::Quarter),
            "8n" => Ok(NoteValue::Eighth),
            "16n" => Ok(NoteValue::Sixteenth),
            "32n" => Ok(NoteValue::ThirtySecond),
            other => Err(NoteValueError(other.to_string())),
        }
    }
}

impl TryFrom<String> for NoteValue {
    type Error = NoteValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteValue> for String {
    fn from(value: NoteValue) -> Self {
        value.notation().to_string()
    }
}

/// Interval of a repeating transport event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepeatInterval {
    /// Tempo-relative, resolved when the event is scheduled
    Note(NoteValue),
    /// Absolute, in milliseconds
    Millis(f64),
}

impl RepeatInterval {
    pub fn to_seconds(&self, tempo: &Tempo) -> f64 {
        match self {
            RepeatInterval::Note(value) => tempo.note_duration_seconds(*value),
            RepeatInterval::Millis(ms) => ms / 1000.0,
        }
    }
}

impl From<NoteValue> for RepeatInterval {
    fn from(value: NoteValue) -> Self {
        RepeatInterval::Note(value)
    }
}
