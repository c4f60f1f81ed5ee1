// Sequencer store - playback state machine for the step roll
// Advances a step counter from a repeating transport event and plays each
// track's notes through the note gate

use super::note::{self, Note, Track};
use super::timeline::{NoteValue, Tempo};
use super::transport::{TransportError, TransportHandler, TransportScheduler};
use crate::audio::{AudioClock, AudioError};
use crate::config::EngineConfig;
use crate::instrument::{Instrument, InstrumentError, NoteGate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

pub const DEFAULT_TRACK: &str = "piano";
pub const DEFAULT_KEYBOARD_OCTAVE: i32 = 4;

/// Octaves the computer keyboard can be shifted to
pub const KEYBOARD_OCTAVE_RANGE: RangeInclusive<i32> = -1..=8;

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),
}

/// Transport payloads handled by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    AdvanceStep,
    ReleaseNote { instrument: String, pitch: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
}

/// Initial roll contents, every field optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RollState {
    pub tracks: Option<Vec<Track>>,
    pub bpm: Option<f64>,
    #[serde(alias = "timeLength")]
    pub time_length: Option<u32>,
    #[serde(alias = "currentTrack")]
    pub current_track: Option<String>,
    #[serde(alias = "keyboardOctive")]
    pub keyboard_octave: Option<i32>,
}

impl RollState {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Observable fields handed to the data-change listener
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollSnapshot {
    pub current_track: String,
    pub keyboard_octave: i32,
    pub step: i64,
    pub time_length: Option<u32>,
    pub tracks: Vec<Track>,
    pub bpm: f64,
    pub status: PlaybackStatus,
    pub active_keys: BTreeMap<String, Vec<String>>,
}

/// Playback state machine (`Stopped -> Playing -> Stopped`)
///
/// The store never owns the transport: every operation that schedules or
/// cancels takes it by `&mut`, and the store is the transport's handler.
/// Each mutating operation ends by publishing a [`RollSnapshot`].
pub struct SequencerStore {
    clock: Arc<dyn AudioClock>,
    gate: NoteGate,
    tracks: Vec<Track>,
    status: PlaybackStatus,
    step: i64,
    bpm: f64,
    time_length: Option<u32>,
    current_track: String,
    keyboard_octave: i32,
    step_value: NoteValue,
    release_gap_steps: f64,
    on_play_end: Option<Box<dyn FnMut()>>,
    on_data_change: Option<Box<dyn FnMut(&RollSnapshot)>>,
}

impl SequencerStore {
    pub fn new(
        initial: RollState,
        clock: Arc<dyn AudioClock>,
        config: &EngineConfig,
    ) -> Result<Self, SequencerError> {
        let bpm = initial.bpm.unwrap_or(config.default_bpm);
        if !Tempo::is_valid_bpm(bpm) {
            return Err(SequencerError::InvalidTempo(bpm));
        }

        Ok(Self {
            clock,
            gate: NoteGate::new(),
            tracks: initial.tracks.unwrap_or_default(),
            status: PlaybackStatus::Stopped,
            step: -1,
            bpm,
            time_length: initial.time_length,
            current_track: initial
                .current_track
                .unwrap_or_else(|| DEFAULT_TRACK.to_string()),
            keyboard_octave: clamp_octave(
                initial.keyboard_octave.unwrap_or(DEFAULT_KEYBOARD_OCTAVE),
            ),
            step_value: config.step_value,
            release_gap_steps: config.release_gap_steps,
            on_play_end: None,
            on_data_change: None,
        })
    }

    // === Queries ===

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Last played step, -1 when stopped
    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn time_length(&self) -> Option<u32> {
        self.time_length
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_track(&self) -> &str {
        &self.current_track
    }

    pub fn keyboard_octave(&self) -> i32 {
        self.keyboard_octave
    }

    pub fn step_value(&self) -> NoteValue {
        self.step_value
    }

    pub fn gate(&self) -> &NoteGate {
        &self.gate
    }

    pub fn clock(&self) -> &Arc<dyn AudioClock> {
        &self.clock
    }

    /// Length computed from the notes
    pub fn default_time_length(&self) -> u32 {
        note::default_time_length(&self.tracks)
    }

    /// Effective sequence length: the explicit length, else the computed one
    /// An explicit length of 0 counts as unset.
    pub fn keyboard_length(&self) -> u32 {
        self.time_length
            .filter(|length| *length > 0)
            .unwrap_or_else(|| self.default_time_length())
    }

    pub fn snapshot(&self) -> RollSnapshot {
        let active_keys = self
            .gate
            .instrument_names()
            .into_iter()
            .map(|name| {
                let keys = self.gate.active_keys(&name);
                (name, keys)
            })
            .collect();

        RollSnapshot {
            current_track: self.current_track.clone(),
            keyboard_octave: self.keyboard_octave,
            step: self.step,
            time_length: self.time_length,
            tracks: self.tracks.clone(),
            bpm: self.bpm,
            status: self.status,
            active_keys,
        }
    }

    // === Listeners ===

    /// Called once each time playback stops with notification
    pub fn set_on_play_end(&mut self, callback: impl FnMut() + 'static) {
        self.on_play_end = Some(Box::new(callback));
    }

    pub fn set_on_data_change(&mut self, callback: impl FnMut(&RollSnapshot) + 'static) {
        self.on_data_change = Some(Box::new(callback));
    }

    fn publish(&mut self) {
        if self.on_data_change.is_none() {
            return;
        }
        let snapshot = self.snapshot();
        if let Some(callback) = self.on_data_change.as_mut() {
            callback(&snapshot);
        }
    }

    // === Editing ===

    pub fn register_instrument(&mut self, name: impl Into<String>, instrument: Instrument) {
        let name = name.into();
        log::debug!("instrument '{}' registered", name);
        self.gate.register(name, instrument);
        self.publish();
    }

    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.publish();
    }

    /// Remove every note, keeping the tracks
    pub fn clear_tracks(&mut self) {
        for track in &mut self.tracks {
            track.notes.clear();
        }
        self.publish();
    }

    pub fn change_track(&mut self, instrument: impl Into<String>) {
        self.current_track = instrument.into();
        self.publish();
    }

    /// Shift the computer keyboard; clamped to [`KEYBOARD_OCTAVE_RANGE`]
    pub fn set_keyboard_octave(&mut self, octave: i32) {
        self.keyboard_octave = clamp_octave(octave);
        self.publish();
    }

    pub fn set_time_length(&mut self, length: Option<u32>) {
        self.time_length = length;
        self.publish();
    }

    /// Change the tempo
    ///
    /// Only conversions made after this call see the new value: a step
    /// repeat that is already scheduled keeps its interval.
    pub fn set_bpm(
        &mut self,
        transport: &mut TransportScheduler<SequencerEvent>,
        bpm: f64,
    ) -> Result<(), SequencerError> {
        if !Tempo::is_valid_bpm(bpm) {
            return Err(SequencerError::InvalidTempo(bpm));
        }
        transport.set_bpm(bpm)?;
        self.bpm = bpm;
        self.publish();
        Ok(())
    }

    // === Manual input ===

    /// Attack a key now (keyboard or mouse input)
    pub fn attack_note(&mut self, instrument: &str, label: &str) -> Result<bool, SequencerError> {
        let attacked = self.gate.attack(instrument, label, self.clock.now())?;
        if attacked {
            self.publish();
        }
        Ok(attacked)
    }

    /// Release a key now
    pub fn release_note(&mut self, instrument: &str, label: &str) -> Result<bool, SequencerError> {
        let released = self.gate.release(instrument, label, self.clock.now())?;
        if released {
            self.publish();
        }
        Ok(released)
    }

    // === Playback ===

    /// Start playback from the first step; no-op while playing
    pub fn play(
        &mut self,
        transport: &mut TransportScheduler<SequencerEvent>,
    ) -> Result<(), SequencerError> {
        if self.is_playing() {
            return Ok(());
        }

        self.clock.resume()?;
        transport.set_bpm(self.bpm)?;
        transport.schedule_repeat(SequencerEvent::AdvanceStep, self.step_value)?;

        self.status = PlaybackStatus::Playing;
        log::debug!(
            "playback started: {} steps of {} at {:.1} BPM",
            self.keyboard_length(),
            self.step_value,
            self.bpm
        );
        self.publish();
        Ok(())
    }

    /// Stop playback; no-op while stopped
    ///
    /// Cancels every transport event and silences every instrument. The
    /// state is reset even if an instrument fails; the first failure is
    /// returned afterwards.
    pub fn stop(
        &mut self,
        transport: &mut TransportScheduler<SequencerEvent>,
        notify: bool,
    ) -> Result<(), SequencerError> {
        if !self.is_playing() {
            return Ok(());
        }

        if notify {
            if let Some(callback) = self.on_play_end.as_mut() {
                callback();
            }
        }

        self.status = PlaybackStatus::Stopped;
        transport.cancel();
        let released = self.gate.release_all_instruments(self.clock.now());
        self.step = -1;

        log::debug!("playback stopped");
        self.publish();
        released.map_err(SequencerError::from)
    }

    /// Play the notes of the next step, stopping at the end of the sequence
    ///
    /// `time` is the step's scheduled audio time.
    pub fn advance_step(
        &mut self,
        transport: &mut TransportScheduler<SequencerEvent>,
        time: f64,
    ) -> Result<(), SequencerError> {
        let target = self.step + 1;

        let mut due: Vec<(String, Note)> = Vec::new();
        if let Ok(target_step) = u32::try_from(target) {
            for name in self.gate.instrument_names() {
                // No track: nothing to play
                let Some(track) = self.tracks.iter().find(|t| t.instrument == name) else {
                    continue;
                };
                due.extend(
                    track
                        .notes_at(target_step)
                        .map(|note| (name.clone(), note.clone())),
                );
            }
        }

        for (name, note) in &due {
            self.trigger_note(transport, name, note, time)?;
        }

        if target >= i64::from(self.keyboard_length()) {
            return self.stop(transport, true);
        }

        self.step = target;
        self.publish();
        Ok(())
    }

    /// Attack `note` at `time` and schedule its release
    ///
    /// The release lands `release_gap_steps` of a step before the note's
    /// end, so a key re-triggered on the next step starts from silence.
    pub fn trigger_note(
        &mut self,
        transport: &mut TransportScheduler<SequencerEvent>,
        instrument: &str,
        note: &Note,
        time: f64,
    ) -> Result<(), SequencerError> {
        self.gate.attack(instrument, &note.pitch, time)?;

        let step_seconds = transport.to_seconds(self.step_value);
        let release_at = time + step_seconds * (note.length() as f64 - self.release_gap_steps);
        transport.schedule(
            SequencerEvent::ReleaseNote {
                instrument: instrument.to_string(),
                pitch: note.pitch.clone(),
            },
            Some(release_at),
        );
        Ok(())
    }
}

fn clamp_octave(octave: i32) -> i32 {
    octave.clamp(*KEYBOARD_OCTAVE_RANGE.start(), *KEYBOARD_OCTAVE_RANGE.end())
}

impl TransportHandler<SequencerEvent> for SequencerStore {
    type Error = SequencerError;

    fn on_event(
        &mut self,
        transport: &mut TransportScheduler<SequencerEvent>,
        payload: SequencerEvent,
        time: f64,
    ) -> Result<(), SequencerError> {
        match payload {
            SequencerEvent::AdvanceStep => self.advance_step(transport, time),
            SequencerEvent::ReleaseNote { instrument, pitch } => {
                if self.gate.release(&instrument, &pitch, time)? {
                    self.publish();
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualClock;
    use crate::clock::ClockType;
    use crate::instrument::InstrumentAdapter;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<String>>>;

    struct Recording {
        calls: Calls,
        fail: bool,
    }

    impl InstrumentAdapter for Recording {
        fn trigger_attack(&mut self, key: &str, _time: f64) -> Result<(), InstrumentError> {
            if self.fail {
                return Err(InstrumentError::Backend("no voices".to_string()));
            }
            self.calls.borrow_mut().push(format!("attack {}", key));
            Ok(())
        }

        fn trigger_release(&mut self, key: &str, _time: f64) -> Result<(), InstrumentError> {
            self.calls.borrow_mut().push(format!("release {}", key));
            Ok(())
        }

        fn release_all(&mut self, _time: f64) -> Result<(), InstrumentError> {
            self.calls.borrow_mut().push("release_all".to_string());
            Ok(())
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            clock_type: ClockType::Timeout,
            ..EngineConfig::default()
        }
    }

    fn setup(
        tracks: Vec<Track>,
        time_length: Option<u32>,
    ) -> (SequencerStore, TransportScheduler<SequencerEvent>, Calls) {
        let clock = Arc::new(ManualClock::new());
        let config = config();
        let transport = TransportScheduler::with_config(clock.clone(), &config);

        let initial = RollState {
            tracks: Some(tracks),
            time_length,
            bpm: Some(120.0),
            ..RollState::default()
        };
        let mut store = SequencerStore::new(initial, clock, &config).unwrap();

        let calls = Calls::default();
        store.register_instrument(
            "piano",
            Instrument::custom(Recording {
                calls: calls.clone(),
                fail: false,
            }),
        );
        (store, transport, calls)
    }

    fn piano(notes: Vec<Note>) -> Vec<Track> {
        vec![Track::new("piano").with_notes(notes)]
    }

    #[test]
    fn test_defaults_from_config() {
        let clock = Arc::new(ManualClock::new());
        let store = SequencerStore::new(RollState::default(), clock, &config()).unwrap();

        assert_eq!(store.status(), PlaybackStatus::Stopped);
        assert_eq!(store.step(), -1);
        assert_eq!(store.bpm(), 90.0);
        assert_eq!(store.current_track(), "piano");
        assert_eq!(store.keyboard_octave(), 4);
        assert_eq!(store.keyboard_length(), 0);
    }

    #[test]
    fn test_invalid_initial_tempo_rejected() {
        let clock = Arc::new(ManualClock::new());
        let initial = RollState {
            bpm: Some(0.0),
            ..RollState::default()
        };
        assert!(matches!(
            SequencerStore::new(initial, clock, &config()),
            Err(SequencerError::InvalidTempo(_))
        ));
    }

    #[test]
    fn test_play_is_idempotent() {
        let (mut store, mut transport, _calls) = setup(piano(vec![Note::new("C4", 0)]), None);

        store.play(&mut transport).unwrap();
        store.play(&mut transport).unwrap();

        assert!(store.is_playing());
        assert!(store.clock().is_running());
        assert_eq!(transport.len(), 1);
        assert_eq!(transport.bpm(), 120.0);
    }

    #[test]
    fn test_stop_resets_and_notifies_once() {
        let (mut store, mut transport, calls) = setup(piano(vec![Note::new("C4", 0)]), Some(8));
        let ended = Rc::new(Cell::new(0));
        let counter = ended.clone();
        store.set_on_play_end(move || counter.set(counter.get() + 1));

        store.play(&mut transport).unwrap();
        transport.tick(&mut store).unwrap();
        assert_eq!(store.step(), 0);
        assert!(store.gate().is_active("piano", "C4"));

        store.stop(&mut transport, true).unwrap();
        store.stop(&mut transport, true).unwrap();

        assert_eq!(ended.get(), 1);
        assert_eq!(store.step(), -1);
        assert_eq!(store.status(), PlaybackStatus::Stopped);
        assert_eq!(store.gate().active_count(), 0);
        assert!(transport.is_empty());
        assert!(!transport.is_running());
        assert_eq!(calls.borrow().last().map(String::as_str), Some("release_all"));
    }

    #[test]
    fn test_stop_without_notify_skips_callback() {
        let (mut store, mut transport, _calls) = setup(Vec::new(), Some(4));
        let ended = Rc::new(Cell::new(false));
        let flag = ended.clone();
        store.set_on_play_end(move || flag.set(true));

        store.play(&mut transport).unwrap();
        store.stop(&mut transport, false).unwrap();
        assert!(!ended.get());
    }

    #[test]
    fn test_reaching_length_stops_within_same_step() {
        let (mut store, mut transport, _calls) = setup(Vec::new(), Some(2));
        store.play(&mut transport).unwrap();

        store.advance_step(&mut transport, 0.0).unwrap();
        assert_eq!(store.step(), 0);
        store.advance_step(&mut transport, 0.25).unwrap();
        assert_eq!(store.step(), 1);

        store.advance_step(&mut transport, 0.5).unwrap();
        assert_eq!(store.status(), PlaybackStatus::Stopped);
        assert_eq!(store.step(), -1);
    }

    #[test]
    fn test_empty_roll_stops_on_first_tick() {
        let (mut store, mut transport, calls) = setup(Vec::new(), None);
        store.play(&mut transport).unwrap();

        assert_eq!(transport.tick(&mut store).unwrap(), 1);
        assert!(!store.is_playing());
        assert!(!transport.is_running());
        assert_eq!(*calls.borrow(), vec!["release_all"]);
    }

    #[test]
    fn test_missing_track_plays_nothing() {
        let tracks = vec![Track::new("bass").with_notes(vec![Note::new("C2", 0)])];
        let (mut store, mut transport, calls) = setup(tracks, Some(4));

        store.play(&mut transport).unwrap();
        store.advance_step(&mut transport, 0.0).unwrap();

        assert!(calls.borrow().is_empty());
        assert_eq!(store.step(), 0);
        assert_eq!(transport.len(), 1);
    }

    #[test]
    fn test_release_scheduled_before_note_end() {
        let (mut store, mut transport, _calls) =
            setup(piano(vec![Note::new("C4", 0).with_duration(3)]), Some(8));
        store.play(&mut transport).unwrap();
        store.advance_step(&mut transport, 1.0).unwrap();

        // 8n at 120 BPM = 0.25s; 3 steps minus a quarter step
        let release = transport
            .events()
            .find(|event| matches!(event.payload, SequencerEvent::ReleaseNote { .. }))
            .unwrap();
        assert!(release.one_shot);
        assert_eq!(release.next_time, 1.0 + 0.25 * 2.75);
    }

    #[test]
    fn test_adapter_error_propagates_from_advance_step() {
        let (mut store, mut transport, _calls) = setup(piano(vec![Note::new("C4", 0)]), Some(4));
        store.register_instrument(
            "piano",
            Instrument::custom(Recording {
                calls: Calls::default(),
                fail: true,
            }),
        );

        store.play(&mut transport).unwrap();
        assert!(matches!(
            transport.tick(&mut store),
            Err(SequencerError::Instrument(_))
        ));
        // The step was not committed
        assert_eq!(store.step(), -1);
        assert!(store.is_playing());
    }

    #[test]
    fn test_set_bpm() {
        let (mut store, mut transport, _calls) = setup(Vec::new(), None);

        store.set_bpm(&mut transport, 150.0).unwrap();
        assert_eq!(store.bpm(), 150.0);
        assert_eq!(transport.bpm(), 150.0);
        assert_eq!(transport.to_seconds(NoteValue::Quarter), 60.0 / 150.0);

        assert!(matches!(
            store.set_bpm(&mut transport, -3.0),
            Err(SequencerError::InvalidTempo(_))
        ));
        assert_eq!(store.bpm(), 150.0);
    }

    #[test]
    fn test_explicit_length_overrides_default() {
        let (mut store, _transport, _calls) =
            setup(piano(vec![Note::new("C4", 0).with_duration(2), Note::new("E4", 2)]), None);
        assert_eq!(store.keyboard_length(), 3);

        store.set_time_length(Some(16));
        assert_eq!(store.keyboard_length(), 16);

        store.set_time_length(Some(0));
        assert_eq!(store.keyboard_length(), 3);
    }

    #[test]
    fn test_keyboard_octave_is_clamped() {
        let (mut store, _transport, _calls) = setup(Vec::new(), None);

        store.set_keyboard_octave(-40);
        assert_eq!(store.keyboard_octave(), -1);
        store.set_keyboard_octave(i32::MAX);
        assert_eq!(store.keyboard_octave(), 8);
        store.set_keyboard_octave(2);
        assert_eq!(store.keyboard_octave(), 2);
    }

    #[test]
    fn test_every_mutation_publishes() {
        let (mut store, _transport, _calls) = setup(piano(vec![Note::new("C4", 0)]), None);
        let snapshots: Rc<RefCell<Vec<RollSnapshot>>> = Rc::default();
        let sink = snapshots.clone();
        store.set_on_data_change(move |snapshot| sink.borrow_mut().push(snapshot.clone()));

        store.change_track("bass");
        store.set_keyboard_octave(5);
        store.clear_tracks();
        store.attack_note("piano", "Db4").unwrap();

        let snapshots = snapshots.borrow();
        assert_eq!(snapshots.len(), 4);
        assert_eq!(snapshots[0].current_track, "bass");
        assert_eq!(snapshots[1].keyboard_octave, 5);
        assert!(snapshots[2].tracks[0].notes.is_empty());
        assert_eq!(snapshots[3].active_keys["piano"], vec!["C#4/Db4"]);
    }

    #[test]
    fn test_manual_and_programmatic_attacks_share_keys() {
        let (mut store, mut transport, calls) = setup(piano(vec![Note::new("C4", 0)]), Some(4));

        assert!(store.attack_note("piano", "C4").unwrap());
        store.play(&mut transport).unwrap();
        transport.tick(&mut store).unwrap();

        // The sequenced C4 found the key already down
        assert_eq!(*calls.borrow(), vec!["attack C4"]);
    }

    #[test]
    fn test_roll_state_from_json() {
        let state = RollState::from_json(
            r#"{
                "tracks": [{"instrument": "piano", "notes": [{"pitch": "C4", "step": 0}]}],
                "bpm": 100,
                "timeLength": 8,
                "keyboardOctive": 3
            }"#,
        )
        .unwrap();

        assert_eq!(state.bpm, Some(100.0));
        assert_eq!(state.time_length, Some(8));
        assert_eq!(state.keyboard_octave, Some(3));
        assert_eq!(state.current_track, None);
        assert_eq!(state.tracks.unwrap()[0].notes[0], Note::new("C4", 0));
    }
}
