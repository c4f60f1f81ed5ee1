// Sequencer module
// Musical time, the look-ahead transport and the step-roll playback store

pub mod keyboard;
pub mod note;
pub mod store;
pub mod timeline;
pub mod transport;

pub use keyboard::KeyboardInput;
pub use note::{Note, Track};
pub use store::{
    PlaybackStatus, RollSnapshot, RollState, SequencerError, SequencerEvent, SequencerStore,
};
pub use timeline::{NoteValue, RepeatInterval, Tempo};
pub use transport::{
    EventId, ScheduledEvent, TransportError, TransportHandler, TransportScheduler, TransportState,
};
