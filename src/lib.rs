// MyMusic Roll - step-sequencer playback engine
// Library exports for the player binary, tests and benchmarks

pub mod audio;
pub mod clock;
pub mod config;
pub mod instrument;
pub mod midi;
pub mod pitch;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::{AudioClock, AudioDevice, AudioTiming, ManualClock, SystemClock};
pub use clock::{ClockSource, ClockType};
pub use config::EngineConfig;
pub use instrument::{
    DrumKit, Instrument, InstrumentAdapter, InstrumentError, MidiInstrument, NoteGate,
};
pub use midi::{MidiCapture, MidiEvent, MidiOutputDevice, MidiSink};
pub use sequencer::{
    KeyboardInput, Note, NoteValue, PlaybackStatus, RollSnapshot, RollState, SequencerError,
    SequencerEvent, SequencerStore, Tempo, Track, TransportHandler, TransportScheduler,
    TransportState,
};
