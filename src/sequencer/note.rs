// Note representation for the sequencer
// Notes sit on a step grid; pitch is a label ("C4", "Db3") or a kit piece ("kick")

use serde::{Deserialize, Serialize};

/// A note on the step grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Pitch label, or piece name for percussion tracks
    #[serde(alias = "value")]
    pub pitch: String,

    /// Start step (0-based)
    #[serde(alias = "time")]
    pub step: u32,

    /// Length in steps; one step when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl Note {
    pub fn new(pitch: impl Into<String>, step: u32) -> Self {
        Self {
            pitch: pitch.into(),
            step,
            duration: None,
        }
    }

    pub fn with_duration(mut self, steps: u32) -> Self {
        self.duration = Some(steps);
        self
    }

    /// Length in steps, zero-length notes count as one step
    pub fn length(&self) -> u32 {
        self.duration.unwrap_or(1).max(1)
    }

    /// First step after the note
    pub fn end_step(&self) -> u32 {
        self.step.saturating_add(self.duration.unwrap_or(1))
    }
}

/// Notes played by one instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub instrument: String,

    #[serde(default)]
    pub notes: Vec<Note>,

    /// Visible key range (low, high), used when listing keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(String, String)>,
}

impl Track {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            notes: Vec::new(),
            range: None,
        }
    }

    pub fn with_notes(mut self, notes: Vec<Note>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_range(mut self, low: impl Into<String>, high: impl Into<String>) -> Self {
        self.range = Some((low.into(), high.into()));
        self
    }

    /// Notes starting on `step`, in track order
    pub fn notes_at(&self, step: u32) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |note| note.step == step)
    }

    /// Every key shown for this track, highest first
    pub fn keys(&self) -> Result<Vec<String>, crate::pitch::PitchError> {
        let labels: Vec<&str> = self.notes.iter().map(|note| note.pitch.as_str()).collect();
        let range = self
            .range
            .as_ref()
            .map(|(low, high)| (low.as_str(), high.as_str()));
        crate::pitch::key_range(&labels, range)
    }
}

/// One past the latest note end-step across all tracks, 0 when there are no notes
pub fn default_time_length(tracks: &[Track]) -> u32 {
    tracks
        .iter()
        .flat_map(|track| track.notes.iter())
        .map(Note::end_step)
        .max()
        .unwrap_or(0)
}
