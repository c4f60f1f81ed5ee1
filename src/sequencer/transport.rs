// Transport - look-ahead scheduler for audio-time-aligned events
// Events are plain values; a handler turns each firing into work

use super::timeline::{NoteValue, RepeatInterval, Tempo};
use crate::audio::AudioClock;
use crate::clock::{ClockSource, ClockType};
use crate::config::EngineConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Identifier returned by `schedule` / `schedule_repeat`
/// Ids increase monotonically, so id order is insertion order.
pub type EventId = u64;

/// Default look-ahead window in seconds
pub const DEFAULT_LOOK_AHEAD: f64 = 0.05;

/// Default clock tick interval in seconds
pub const DEFAULT_SCHEDULE_AHEAD: f64 = 0.025;

/// Shortest repeat interval in seconds (1µs)
pub const MIN_REPEAT_INTERVAL: f64 = 1e-6;

/// Transport state (running while at least one event is pending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Started,
}

/// A pending transport event
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent<E> {
    pub id: EventId,
    pub payload: E,
    /// Seconds between firings, 0 for one-shot events
    pub interval: f64,
    /// Absolute audio time of the next firing
    pub next_time: f64,
    pub one_shot: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Repeat interval must be at least 1µs, got {0}s")]
    InvalidInterval(f64),

    #[error("Invalid tempo: {0} BPM")]
    InvalidBpm(f64),
}

/// Receives event firings from [`TransportScheduler::tick`]
///
/// `time` is the event's own scheduled audio time, never the tick's wall
/// time. The handler may schedule, clear or cancel events while the tick
/// is draining; an error aborts the rest of the tick.
pub trait TransportHandler<E> {
    type Error;

    fn on_event(
        &mut self,
        transport: &mut TransportScheduler<E>,
        payload: E,
        time: f64,
    ) -> Result<(), Self::Error>;
}

/// Transport scheduler
/// Owns scheduled events and the clock source that wakes it up
pub struct TransportScheduler<E> {
    clock: Arc<dyn AudioClock>,
    events: BTreeMap<EventId, ScheduledEvent<E>>,
    event_id_counter: EventId,
    state: TransportState,
    look_ahead: f64,
    schedule_ahead: f64,
    clock_type: ClockType,
    ticker: Option<ClockSource>,
    tempo: Tempo,
}

impl<E: Clone> TransportScheduler<E> {
    /// Create a stopped transport reading time from `clock`
    pub fn new(clock: Arc<dyn AudioClock>) -> Self {
        Self {
            clock,
            events: BTreeMap::new(),
            event_id_counter: 0,
            state: TransportState::Stopped,
            look_ahead: DEFAULT_LOOK_AHEAD,
            schedule_ahead: DEFAULT_SCHEDULE_AHEAD,
            clock_type: ClockType::default(),
            ticker: None,
            tempo: Tempo::default(),
        }
    }

    /// Create a transport with timing settings from the engine config
    pub fn with_config(clock: Arc<dyn AudioClock>, config: &EngineConfig) -> Self {
        let mut transport = Self::new(clock);
        transport.set_look_ahead(config.look_ahead_secs);
        transport.set_schedule_ahead(config.schedule_ahead_secs);
        transport.clock_type = config.clock_type;
        if Tempo::is_valid_bpm(config.default_bpm) {
            transport.tempo = Tempo::new(config.default_bpm);
        }
        transport
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Started
    }

    /// Current audio time
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<dyn AudioClock> {
        &self.clock
    }

    /// Clock source, present while the transport is running
    pub fn ticker(&self) -> Option<&ClockSource> {
        self.ticker.as_ref()
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    /// Set the tempo used by future note-value conversions
    /// Repeats that are already scheduled keep their interval.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), TransportError> {
        if !Tempo::is_valid_bpm(bpm) {
            return Err(TransportError::InvalidBpm(bpm));
        }
        self.tempo.set_bpm(bpm);
        Ok(())
    }

    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    /// Seconds spanned by a note value at the current tempo
    pub fn to_seconds(&self, value: NoteValue) -> f64 {
        self.tempo.note_duration_seconds(value)
    }

    pub fn look_ahead(&self) -> f64 {
        self.look_ahead
    }

    /// Set the look-ahead window in seconds (at least 1 ms)
    pub fn set_look_ahead(&mut self, seconds: f64) {
        self.look_ahead = seconds.max(0.001);
    }

    pub fn schedule_ahead(&self) -> f64 {
        self.schedule_ahead
    }

    /// Set the clock tick interval in seconds (at least 1 ms)
    pub fn set_schedule_ahead(&mut self, seconds: f64) {
        self.schedule_ahead = seconds.max(0.001);
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.set_interval(self.schedule_ahead);
        }
    }

    /// Preferred clock primitive; applied to a live clock immediately
    pub fn set_clock_type(&mut self, clock_type: ClockType) {
        self.clock_type = clock_type;
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.set_type(clock_type);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event(&self, id: EventId) -> Option<&ScheduledEvent<E>> {
        self.events.get(&id)
    }

    /// Pending events in firing order for equal times
    pub fn events(&self) -> impl Iterator<Item = &ScheduledEvent<E>> {
        self.events.values()
    }

    /// Start the clock source if not running
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let mut ticker = ClockSource::new(
            self.clock_type,
            self.schedule_ahead,
            self.clock.sample_rate(),
            self.clock.buffer_size(),
        );
        ticker.start();

        self.ticker = Some(ticker);
        self.state = TransportState::Started;
        log::debug!("transport started");
    }

    /// Stop and dispose the clock source
    /// Pending events are kept; use `cancel` to drop them.
    pub fn stop(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.dispose();
        }
        if self.state == TransportState::Started {
            log::debug!("transport stopped");
        }
        self.state = TransportState::Stopped;
    }

    /// Fire `payload` every `interval`, starting on the very next tick
    pub fn schedule_repeat(
        &mut self,
        payload: E,
        interval: impl Into<RepeatInterval>,
    ) -> Result<EventId, TransportError> {
        let interval = interval.into().to_seconds(&self.tempo);
        if !(interval.is_finite() && interval >= MIN_REPEAT_INTERVAL) {
            return Err(TransportError::InvalidInterval(interval));
        }

        let next_time = self.clock.now();
        Ok(self.insert(payload, interval, next_time, false))
    }

    /// Fire `payload` once at `at` (absolute audio time, default now)
    pub fn schedule(&mut self, payload: E, at: Option<f64>) -> EventId {
        let next_time = at.unwrap_or_else(|| self.clock.now());
        self.insert(payload, 0.0, next_time, true)
    }

    fn insert(&mut self, payload: E, interval: f64, next_time: f64, one_shot: bool) -> EventId {
        self.event_id_counter += 1;
        let id = self.event_id_counter;

        self.events.insert(
            id,
            ScheduledEvent {
                id,
                payload,
                interval,
                next_time,
                one_shot,
            },
        );

        if !self.is_running() {
            self.start();
        }
        id
    }

    /// Remove one event, stopping the transport if nothing remains
    pub fn clear(&mut self, id: EventId) -> bool {
        let removed = self.events.remove(&id).is_some();
        if self.events.is_empty() {
            self.stop();
        }
        removed
    }

    /// Remove every event and stop
    pub fn cancel(&mut self) {
        self.events.clear();
        self.stop();
    }

    /// Fire every event due before `now + look_ahead`
    ///
    /// Each event is drained repeatedly, so a late tick catches up on every
    /// missed firing. Returns the number of firings.
    pub fn tick<H>(&mut self, handler: &mut H) -> Result<usize, H::Error>
    where
        H: TransportHandler<E>,
    {
        if !self.is_running() {
            return Ok(0);
        }

        let look_ahead_time = self.clock.now() + self.look_ahead;
        let mut fired = 0;

        // Events added by handlers during this tick are visited too
        let mut cursor: EventId = 0;
        while let Some(id) = self.events.range(cursor..).next().map(|(id, _)| *id) {
            cursor = id + 1;

            loop {
                let Some(event) = self.events.get_mut(&id) else {
                    break; // cleared by a handler
                };
                if event.next_time >= look_ahead_time {
                    break;
                }

                let time = event.next_time;
                // Interval lost to float precision: fire once per tick
                let mut stalled = false;
                let payload = if event.one_shot {
                    match self.events.remove(&id) {
                        Some(event) => event.payload,
                        None => break,
                    }
                } else {
                    let next_time = event.next_time + event.interval;
                    stalled = next_time <= event.next_time;
                    event.next_time = next_time;
                    event.payload.clone()
                };

                fired += 1;
                handler.on_event(self, payload, time)?;

                if stalled || !self.events.contains_key(&id) {
                    break;
                }
            }
        }

        // Idle when nothing is pending
        if self.events.is_empty() {
            self.stop();
        }

        Ok(fired)
    }

    /// Tick if the clock source has signalled since the last call
    pub fn pump<H>(&mut self, handler: &mut H) -> Result<usize, H::Error>
    where
        H: TransportHandler<E>,
    {
        let due = self.ticker.as_mut().is_some_and(|ticker| ticker.poll());
        if due { self.tick(handler) } else { Ok(0) }
    }

    /// Host-loop helper: park until the next clock tick (or `max_wait`), then pump
    pub fn wait_and_pump<H>(
        &mut self,
        handler: &mut H,
        max_wait: Duration,
    ) -> Result<usize, H::Error>
    where
        H: TransportHandler<E>,
    {
        let due = self
            .ticker
            .as_mut()
            .is_some_and(|ticker| ticker.wait(max_wait));
        if due { self.tick(handler) } else { Ok(0) }
    }
}

impl<E> Drop for TransportScheduler<E> {
    fn drop(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.dispose();
        }
    }
}
