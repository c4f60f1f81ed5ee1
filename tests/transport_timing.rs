//! Transport timing tests
//!
//! Firing times come from the schedule, never from when the tick ran.

use mymusic_roll::audio::AudioClock;
use mymusic_roll::sequencer::RepeatInterval;
use mymusic_roll::{
    ClockType, ManualClock, NoteValue, SystemClock, TransportHandler, TransportScheduler,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Times {
    fired: Vec<f64>,
}

impl TransportHandler<()> for Times {
    type Error = Infallible;

    fn on_event(
        &mut self,
        _transport: &mut TransportScheduler<()>,
        _payload: (),
        time: f64,
    ) -> Result<(), Infallible> {
        self.fired.push(time);
        Ok(())
    }
}

fn manual_transport() -> (ManualClock, TransportScheduler<()>) {
    let clock = ManualClock::new();
    let mut transport = TransportScheduler::new(Arc::new(clock.clone()));
    transport.set_clock_type(ClockType::Timeout);
    (clock, transport)
}

fn assert_arithmetic(times: &[f64], start: f64, step: f64) {
    for (i, time) in times.iter().enumerate() {
        let expected = start + step * i as f64;
        assert!(
            (time - expected).abs() < 1e-9,
            "firing {} at {}, expected {}",
            i,
            time,
            expected
        );
    }
}

#[test]
fn test_repeat_fires_once_per_interval_tick() {
    let (clock, mut transport) = manual_transport();
    clock.set(1.0);
    transport
        .schedule_repeat((), RepeatInterval::Millis(100.0))
        .unwrap();

    let mut times = Times::default();
    // Ticks spaced exactly one interval apart, with some jitter inside
    for (n, jitter) in [0.0, 0.004, 0.011, 0.002, 0.0, 0.017, 0.009, 0.001]
        .iter()
        .enumerate()
    {
        clock.set(1.0 + n as f64 * 0.1 + jitter);
        assert_eq!(transport.tick(&mut times).unwrap(), 1);
    }

    assert_eq!(times.fired.len(), 8);
    assert_arithmetic(&times.fired, 1.0, 0.1);
}

#[test]
fn test_late_tick_drains_several_firings() {
    let (clock, mut transport) = manual_transport();
    transport.set_look_ahead(0.05);
    transport
        .schedule_repeat((), RepeatInterval::Millis(10.0))
        .unwrap();

    let mut times = Times::default();
    transport.tick(&mut times).unwrap();
    let first = times.fired.len();
    assert!(first > 1, "look-ahead alone covers several 10ms events");

    // 80ms stall
    clock.set(0.08);
    let caught_up = transport.tick(&mut times).unwrap();
    assert!(caught_up >= 8, "drained {} firings", caught_up);

    // Window is [.., now + look_ahead)
    assert!(times.fired.iter().all(|t| *t < 0.13));
    assert_arithmetic(&times.fired, 0.0, 0.01);
}

#[test]
fn test_tempo_change_not_retroactive() {
    let (_clock, mut transport) = manual_transport();

    transport.set_bpm(120.0).unwrap();
    let before = transport.schedule_repeat((), NoteValue::Quarter).unwrap();

    transport.set_bpm(100.0).unwrap();
    assert_eq!(transport.bpm(), 100.0);
    assert_eq!(transport.to_seconds(NoteValue::Quarter), 60.0 / 100.0);

    let after = transport.schedule_repeat((), NoteValue::Quarter).unwrap();
    assert_eq!(transport.event(before).unwrap().interval, 0.5);
    assert_eq!(transport.event(after).unwrap().interval, 0.6);
}

#[test]
fn test_firings_never_go_backwards_per_event() {
    let (clock, mut transport) = manual_transport();
    transport
        .schedule_repeat((), RepeatInterval::Note(NoteValue::Sixteenth))
        .unwrap();

    let mut times = Times::default();
    let mut now = 0.0;
    for gap in [0.01, 0.3, 0.0, 0.05, 0.7, 0.02] {
        now += gap;
        clock.set(now);
        transport.tick(&mut times).unwrap();
    }

    assert!(times.fired.windows(2).all(|pair| pair[0] < pair[1]));
}

/// Real clocks: the worker thread wakes the host loop
#[test]
fn test_worker_clock_drives_host_loop() {
    let clock = Arc::new(SystemClock::new());
    clock.resume().unwrap();

    let mut transport: TransportScheduler<()> = TransportScheduler::new(clock.clone());
    transport.set_schedule_ahead(0.005);
    transport
        .schedule_repeat((), RepeatInterval::Millis(20.0))
        .unwrap();
    assert!(transport.ticker().is_some_and(|t| t.is_active()));

    let mut times = Times::default();
    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        transport
            .wait_and_pump(&mut times, Duration::from_millis(10))
            .unwrap();
    }

    // ~10 firings over 200ms, allowing for a loaded machine
    assert!(times.fired.len() >= 5, "only {} firings", times.fired.len());
    assert!(times.fired.iter().all(|t| *t <= clock.now() + transport.look_ahead()));
    for pair in times.fired.windows(2) {
        assert!((pair[1] - pair[0] - 0.02).abs() < 1e-9);
    }

    transport.cancel();
    assert!(transport.ticker().is_none());
}
