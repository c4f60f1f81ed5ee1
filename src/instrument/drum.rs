// Drum kit - percussion pieces on the General MIDI drum channel

use super::{InstrumentAdapter, InstrumentError};
use crate::midi::event::PERCUSSION_CHANNEL;
use crate::midi::{MidiEvent, MidiSink};
use std::collections::BTreeSet;

/// Standard kit: piece name -> General MIDI percussion key
pub const STANDARD_KIT: [(&str, u8); 8] = [
    ("kick", 36),
    ("snare", 38),
    ("clap", 39),
    ("hihat", 42),
    ("tom", 45),
    ("openhat", 46),
    ("crash", 49),
    ("ride", 51),
];

/// Noise instrument keyed by piece name
pub struct DrumKit {
    sink: Box<dyn MidiSink>,
    pieces: Vec<(String, u8)>,
    velocity: u8,
    sounding: BTreeSet<u8>,
}

impl DrumKit {
    pub fn new(sink: impl MidiSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            pieces: STANDARD_KIT
                .iter()
                .map(|(name, note)| (name.to_string(), *note))
                .collect(),
            velocity: 110,
            sounding: BTreeSet::new(),
        }
    }

    /// Add or remap a piece
    pub fn with_piece(mut self, name: &str, note: u8) -> Self {
        let note = note & 0x7F;
        match self.pieces.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = note,
            None => self.pieces.push((name.to_string(), note)),
        }
        self
    }

    pub fn piece_names(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().map(|(n, _)| n.as_str())
    }

    fn note_for(&self, piece: &str) -> Result<u8, InstrumentError> {
        self.pieces
            .iter()
            .find(|(n, _)| n == piece)
            .map(|(_, note)| *note)
            .ok_or_else(|| InstrumentError::UnknownPiece(piece.to_string()))
    }
}

impl InstrumentAdapter for DrumKit {
    fn trigger_attack(&mut self, key: &str, _time: f64) -> Result<(), InstrumentError> {
        let note = self.note_for(key)?;
        let event = MidiEvent::NoteOn {
            channel: PERCUSSION_CHANNEL,
            note,
            velocity: self.velocity,
        };
        self.sink.send(&event.to_bytes())?;
        self.sounding.insert(note);
        Ok(())
    }

    fn trigger_release(&mut self, key: &str, _time: f64) -> Result<(), InstrumentError> {
        let note = self.note_for(key)?;
        let event = MidiEvent::NoteOff {
            channel: PERCUSSION_CHANNEL,
            note,
        };
        self.sink.send(&event.to_bytes())?;
        self.sounding.remove(&note);
        Ok(())
    }

    fn release_all(&mut self, _time: f64) -> Result<(), InstrumentError> {
        for note in std::mem::take(&mut self.sounding) {
            let event = MidiEvent::NoteOff {
                channel: PERCUSSION_CHANNEL,
                note,
            };
            self.sink.send(&event.to_bytes())?;
        }
        Ok(())
    }

    fn is_noise(&self) -> bool {
        true
    }
}
