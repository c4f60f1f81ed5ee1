use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mymusic_roll::sequencer::RepeatInterval;
use mymusic_roll::{
    ClockType, EngineConfig, Instrument, InstrumentAdapter, InstrumentError, ManualClock, Note,
    NoteGate, RollState, SequencerStore, Track, TransportHandler, TransportScheduler,
};
use std::convert::Infallible;
use std::sync::Arc;

struct Sink;

impl TransportHandler<u32> for Sink {
    type Error = Infallible;

    fn on_event(
        &mut self,
        _transport: &mut TransportScheduler<u32>,
        payload: u32,
        time: f64,
    ) -> Result<(), Infallible> {
        black_box((payload, time));
        Ok(())
    }
}

struct Silent;

impl InstrumentAdapter for Silent {
    fn trigger_attack(&mut self, key: &str, time: f64) -> Result<(), InstrumentError> {
        black_box((key, time));
        Ok(())
    }

    fn trigger_release(&mut self, key: &str, time: f64) -> Result<(), InstrumentError> {
        black_box((key, time));
        Ok(())
    }

    fn release_all(&mut self, _time: f64) -> Result<(), InstrumentError> {
        Ok(())
    }
}

/// Benchmark one tick draining many pending events (a late tick catching up)
fn bench_transport_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport_tick");

    for event_count in [1, 16, 128] {
        group.bench_with_input(
            BenchmarkId::from_parameter(event_count),
            &event_count,
            |b, &count| {
                let clock = ManualClock::new();
                let mut transport = TransportScheduler::new(Arc::new(clock.clone()));
                transport.set_clock_type(ClockType::Timeout);
                for i in 0..count {
                    transport
                        .schedule_repeat(i, RepeatInterval::Millis(10.0))
                        .unwrap();
                }

                let mut now = 0.0;
                b.iter(|| {
                    now += 0.025;
                    clock.set(now);
                    black_box(transport.tick(&mut Sink).unwrap());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark gate bookkeeping (canonical naming on every call)
fn bench_note_gate(c: &mut Criterion) {
    let mut gate = NoteGate::new();
    gate.register("piano", Instrument::custom(Silent));
    let labels = ["C4", "C#4", "Db4", "E4", "G4", "Bb3"];

    c.bench_function("note_gate_attack_release", |b| {
        b.iter(|| {
            for label in labels {
                black_box(gate.attack("piano", label, 0.0).unwrap());
            }
            for label in labels {
                black_box(gate.release("piano", label, 0.0).unwrap());
            }
        });
    });
}

/// Benchmark a full step with a dense 4-track roll
fn bench_advance_step(c: &mut Criterion) {
    let tracks: Vec<Track> = ["piano", "bass", "lead", "pad"]
        .iter()
        .map(|name| {
            Track::new(*name).with_notes(
                (0..64)
                    .flat_map(|step| {
                        [Note::new("C4", step), Note::new("E4", step), Note::new("G4", step)]
                    })
                    .collect(),
            )
        })
        .collect();

    let config = EngineConfig {
        clock_type: ClockType::Timeout,
        ..EngineConfig::default()
    };
    let clock = ManualClock::new();
    let mut transport = TransportScheduler::with_config(Arc::new(clock.clone()), &config);
    let mut store = SequencerStore::new(
        RollState {
            tracks: Some(tracks),
            time_length: Some(u32::MAX),
            ..RollState::default()
        },
        Arc::new(clock.clone()),
        &config,
    )
    .unwrap();
    for name in ["piano", "bass", "lead", "pad"] {
        store.register_instrument(name, Instrument::custom(Silent));
    }
    store.play(&mut transport).unwrap();

    let mut now = 0.0;
    c.bench_function("sequencer_advance_step", |b| {
        b.iter(|| {
            now += 1.0 / 3.0;
            clock.set(now);
            black_box(transport.tick(&mut store).unwrap());
        });
    });
}

criterion_group!(benches, bench_transport_tick, bench_note_gate, bench_advance_step);
criterion_main!(benches);
