// Computer keyboard input - two rows of keys played as a piano octave

use super::store::{SequencerError, SequencerStore};
use crate::instrument::InstrumentAdapter;
use crate::pitch::Pitch;
use std::collections::HashMap;

/// Key codes from C up to the C of the next octave
pub const KEY_CODES: [&str; 13] = [
    "KeyQ", "Digit2", "KeyW", "Digit3", "KeyE", "KeyR", "Digit5", "KeyT", "Digit6", "KeyY",
    "Digit7", "KeyU", "KeyI",
];

/// Forwards key presses to the store's current track
///
/// A held key remembers what it attacked, so changing track or octave while
/// holding it still releases the right note.
#[derive(Debug, Default)]
pub struct KeyboardInput {
    held: HashMap<String, (String, String)>,
}

impl KeyboardInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pitch label played by `code` at `octave`
    pub fn label_for(code: &str, octave: i32) -> Option<String> {
        let index = KEY_CODES.iter().position(|c| *c == code)?;
        let semitones = octave.checked_mul(12)?.checked_add(index as i32)?;
        Some(Pitch::from_semitones(semitones).canonical())
    }

    /// Returns whether a note was attacked
    /// Auto-repeat presses of a held key are ignored.
    pub fn key_down(
        &mut self,
        store: &mut SequencerStore,
        code: &str,
    ) -> Result<bool, SequencerError> {
        if self.held.contains_key(code) {
            return Ok(false);
        }

        let instrument = store.current_track().to_string();
        let pitched = store
            .gate()
            .instruments()
            .get(&instrument)
            .is_some_and(|i| !i.is_noise());
        if !pitched {
            return Ok(false);
        }

        let Some(label) = Self::label_for(code, store.keyboard_octave()) else {
            return Ok(false);
        };

        let attacked = store.attack_note(&instrument, &label)?;
        self.held.insert(code.to_string(), (instrument, label));
        Ok(attacked)
    }

    /// Returns whether a note was released
    pub fn key_up(
        &mut self,
        store: &mut SequencerStore,
        code: &str,
    ) -> Result<bool, SequencerError> {
        match self.held.remove(code) {
            Some((instrument, label)) => store.release_note(&instrument, &label),
            None => Ok(false),
        }
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}
