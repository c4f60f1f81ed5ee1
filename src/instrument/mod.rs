// Instruments - attack/release capability behind the note gate

pub mod drum;
pub mod gate;
pub mod midi_out;

pub use drum::DrumKit;
pub use gate::NoteGate;
pub use midi_out::MidiInstrument;

use crate::midi::MidiError;
use crate::pitch::PitchError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstrumentError {
    #[error(transparent)]
    Pitch(#[from] PitchError),

    #[error("Unknown kit piece: '{0}'")]
    UnknownPiece(String),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error("Instrument backend error: {0}")]
    Backend(String),
}

/// Something that can sound and silence keys
///
/// `key` is the label as written in the track; `time` is the audio time the
/// event is meant for, which may be slightly ahead of the clock.
pub trait InstrumentAdapter {
    fn trigger_attack(&mut self, key: &str, time: f64) -> Result<(), InstrumentError>;

    fn trigger_release(&mut self, key: &str, time: f64) -> Result<(), InstrumentError>;

    /// Silence everything at once (panic release)
    fn release_all(&mut self, time: f64) -> Result<(), InstrumentError>;

    /// Percussion instruments key on raw labels ("kick") instead of pitches
    fn is_noise(&self) -> bool {
        false
    }
}

/// Registered instrument kinds
pub enum Instrument {
    Midi(MidiInstrument),
    Drum(DrumKit),
    Custom(Box<dyn InstrumentAdapter>),
}

impl Instrument {
    pub fn custom(adapter: impl InstrumentAdapter + 'static) -> Self {
        Instrument::Custom(Box::new(adapter))
    }

    fn adapter(&mut self) -> &mut dyn InstrumentAdapter {
        match self {
            Instrument::Midi(midi) => midi,
            Instrument::Drum(drum) => drum,
            Instrument::Custom(custom) => custom.as_mut(),
        }
    }
}

impl InstrumentAdapter for Instrument {
    fn trigger_attack(&mut self, key: &str, time: f64) -> Result<(), InstrumentError> {
        self.adapter().trigger_attack(key, time)
    }

    fn trigger_release(&mut self, key: &str, time: f64) -> Result<(), InstrumentError> {
        self.adapter().trigger_release(key, time)
    }

    fn release_all(&mut self, time: f64) -> Result<(), InstrumentError> {
        self.adapter().release_all(time)
    }

    fn is_noise(&self) -> bool {
        match self {
            Instrument::Midi(midi) => midi.is_noise(),
            Instrument::Drum(drum) => drum.is_noise(),
            Instrument::Custom(custom) => custom.is_noise(),
        }
    }
}

impl From<MidiInstrument> for Instrument {
    fn from(instrument: MidiInstrument) -> Self {
        Instrument::Midi(instrument)
    }
}

impl From<DrumKit> for Instrument {
    fn from(kit: DrumKit) -> Self {
        Instrument::Drum(kit)
    }
}

/// Instruments by name, kept in registration order
#[derive(Default)]
pub struct InstrumentRegistry {
    entries: Vec<(String, Instrument)>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the instrument called `name`
    /// A replaced instrument keeps its position.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        instrument: Instrument,
    ) -> Option<Instrument> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, instrument)),
            None => {
                self.entries.push((name, instrument));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Instrument> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, i)| i)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Instrument> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, i)| i)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
