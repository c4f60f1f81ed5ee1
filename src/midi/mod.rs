// Module MIDI - channel messages and output ports for external instruments

pub mod event;
pub mod output;

pub use event::MidiEvent;
pub use output::{MidiCapture, MidiOutputDevice, MidiSink};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to initialize MIDI: {0}")]
    Init(String),

    #[error("MIDI output port not found: {0}")]
    NoPort(String),

    #[error("MIDI connection error: {0}")]
    Connect(String),

    #[error("MIDI send error: {0}")]
    Send(String),

    #[error("MIDI sink lock poisoned")]
    Poisoned,
}
