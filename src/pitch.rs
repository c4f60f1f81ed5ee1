// Pitch naming - spelled pitch labels to canonical key identifiers
// "C#4" and "Db4" name the same key: "C#4/Db4"

use std::fmt;
use std::ops::RangeInclusive;

/// Key names within one octave, enharmonic pairs joined by '/'
pub const OCTAVE_NAMES: [&str; 12] = [
    "C", "C#/Db", "D", "D#/Eb", "E", "F", "F#/Gb", "G", "G#/Ab", "A", "A#/Bb", "B",
];

/// Octave numbers a label may carry
pub const OCTAVE_RANGE: RangeInclusive<i32> = -2..=10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PitchError {
    #[error("Invalid pitch label: '{0}'")]
    InvalidLabel(String),

    #[error("Pitch {0} is outside the MIDI range")]
    OutOfMidiRange(String),
}

/// A chromatic key: pitch class (0 = C) and octave (C4 = middle C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pitch {
    // Field order gives octave-major ordering
    octave: i32,
    pitch_class: u8,
}

impl Pitch {
    /// Parse a label such as "C4", "F#3", "Bb2", "C-1" or "C#4/Db4"
    ///
    /// Accidentals may push the key into the neighbouring octave
    /// ("Cb4" is B3, "B#3" is C4).
    pub fn parse(label: &str) -> Result<Self, PitchError> {
        let invalid = || PitchError::InvalidLabel(label.to_string());

        // Combined form: the first spelling is enough
        let spelled = label.split('/').next().unwrap_or("").trim();

        let mut chars = spelled.chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let base = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave: i32 = octave_str.parse().map_err(|_| invalid())?;
        if !OCTAVE_RANGE.contains(&octave) {
            return Err(invalid());
        }
        Ok(Self::from_semitones(octave * 12 + base + accidental))
    }

    /// Build from semitones counted from C0
    pub fn from_semitones(semitones: i32) -> Self {
        Self {
            octave: semitones.div_euclid(12),
            pitch_class: semitones.rem_euclid(12) as u8,
        }
    }

    pub fn semitones(&self) -> i32 {
        // Fits: every Pitch comes from an i32 semitone count
        (i64::from(self.octave) * 12 + i64::from(self.pitch_class)) as i32
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch_class
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    /// MIDI note number (C4 = 60)
    pub fn midi_number(&self) -> Result<u8, PitchError> {
        self.semitones()
            .checked_add(12)
            .and_then(|number| u8::try_from(number).ok())
            .filter(|n| *n <= 127)
            .ok_or_else(|| PitchError::OutOfMidiRange(self.to_string()))
    }

    /// Canonical identifier, e.g. "C#4/Db4" or "E4"
    pub fn canonical(&self) -> String {
        OCTAVE_NAMES[self.pitch_class as usize]
            .split('/')
            .map(|name| format!("{}{}", name, self.octave))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Canonical identifier for a label; combined labels pass through unchanged
pub fn canonical(label: &str) -> Result<String, PitchError> {
    if label.contains('/') {
        return Ok(label.to_string());
    }
    Ok(Pitch::parse(label)?.canonical())
}

/// Every key between the lowest and highest of `labels` and `range`, highest first
pub fn key_range(labels: &[&str], range: Option<(&str, &str)>) -> Result<Vec<String>, PitchError> {
    let mut pitches = labels
        .iter()
        .map(|label| Pitch::parse(label))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some((low, high)) = range {
        pitches.push(Pitch::parse(low)?);
        pitches.push(Pitch::parse(high)?);
    }

    let (Some(lowest), Some(highest)) = (pitches.iter().min(), pitches.iter().max()) else {
        return Ok(Vec::new());
    };

    Ok((lowest.semitones()..=highest.semitones())
        .rev()
        .map(|semitones| Pitch::from_semitones(semitones).canonical())
        .collect())
}
