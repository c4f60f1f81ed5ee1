// Pitched instrument played through a MIDI output

use super::{InstrumentAdapter, InstrumentError};
use crate::midi::event::ALL_NOTES_OFF;
use crate::midi::{MidiEvent, MidiSink};
use crate::pitch::Pitch;
use std::collections::BTreeSet;

pub const DEFAULT_VELOCITY: u8 = 100;

/// Sends note-on/note-off on one channel
///
/// Messages go out as soon as the gate forwards them; the scheduled time is
/// not used to delay delivery.
pub struct MidiInstrument {
    sink: Box<dyn MidiSink>,
    channel: u8,
    velocity: u8,
    sounding: BTreeSet<u8>,
}

impl MidiInstrument {
    /// `channel` is 0-based (0-15)
    pub fn new(sink: impl MidiSink + 'static, channel: u8) -> Self {
        Self {
            sink: Box::new(sink),
            channel: channel & 0x0F,
            velocity: DEFAULT_VELOCITY,
            sounding: BTreeSet::new(),
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity.clamp(1, 127);
        self
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// MIDI note numbers currently held
    pub fn sounding_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.sounding.iter().copied()
    }

    fn send(&mut self, event: MidiEvent) -> Result<(), InstrumentError> {
        self.sink.send(&event.to_bytes())?;
        Ok(())
    }
}

impl InstrumentAdapter for MidiInstrument {
    fn trigger_attack(&mut self, key: &str, _time: f64) -> Result<(), InstrumentError> {
        let note = Pitch::parse(key)?.midi_number()?;
        self.send(MidiEvent::NoteOn {
            channel: self.channel,
            note,
            velocity: self.velocity,
        })?;
        self.sounding.insert(note);
        Ok(())
    }

    fn trigger_release(&mut self, key: &str, _time: f64) -> Result<(), InstrumentError> {
        let note = Pitch::parse(key)?.midi_number()?;
        self.send(MidiEvent::NoteOff {
            channel: self.channel,
            note,
        })?;
        self.sounding.remove(&note);
        Ok(())
    }

    fn release_all(&mut self, _time: f64) -> Result<(), InstrumentError> {
        for note in std::mem::take(&mut self.sounding) {
            self.send(MidiEvent::NoteOff {
                channel: self.channel,
                note,
            })?;
        }
        self.send(MidiEvent::ControlChange {
            channel: self.channel,
            controller: ALL_NOTES_OFF,
            value: 0,
        })
    }
}
