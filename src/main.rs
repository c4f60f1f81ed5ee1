use mymusic_roll::{
    AudioClock, AudioDevice, DrumKit, EngineConfig, Instrument, MidiCapture, MidiInstrument,
    MidiOutputDevice, MidiSink, Note, RollState, SequencerStore, SystemClock, Track,
    TransportScheduler,
};
use std::sync::Arc;
use std::time::Duration;

// Longest the host thread parks between clock ticks
const MAX_WAIT: Duration = Duration::from_millis(100);

/// Minimal stderr logger; level from ROLL_LOG (default: info)
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() {
    let level = std::env::var("ROLL_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(log::LevelFilter::Info);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Command line: roll-player [ROLL.json] [--config ENGINE.ron]
struct Args {
    roll: Option<String>,
    config: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        roll: None,
        config: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => args.config = iter.next(),
            _ => args.roll = Some(arg),
        }
    }
    args
}

fn demo_roll() -> RollState {
    let melody = ["C4", "E4", "G4", "E4", "F4", "A4", "G4", "B3"];
    let piano = Track::new("piano").with_notes(
        melody
            .iter()
            .enumerate()
            .map(|(i, pitch)| Note::new(*pitch, i as u32 * 2).with_duration(2))
            .collect(),
    );
    let drum = Track::new("drum").with_notes(
        (0..16)
            .map(|step| {
                let piece = match step % 4 {
                    0 => "kick",
                    2 => "snare",
                    _ => "hihat",
                };
                Note::new(piece, step)
            })
            .collect(),
    );

    RollState {
        tracks: Some(vec![piano, drum]),
        bpm: Some(110.0),
        ..RollState::default()
    }
}

fn open_clock(config: &EngineConfig) -> Arc<dyn AudioClock> {
    match AudioDevice::open_default(config.buffer_size) {
        Ok(device) => {
            println!("Audio clock: {} ({} Hz)", device.name(), device.sample_rate());
            Arc::new(device)
        }
        Err(e) => {
            eprintln!("WARNING: audio device failed ({}), using the system clock", e);
            Arc::new(SystemClock::new())
        }
    }
}

/// MIDI sink for one instrument: the configured port, else an in-memory capture
fn open_sink(config: &EngineConfig) -> Box<dyn MidiSink> {
    match MidiOutputDevice::connect(config.midi_port.as_deref()) {
        Ok(device) => Box::new(device),
        Err(e) => {
            eprintln!("WARNING: {} - notes will not be audible", e);
            Box::new(MidiCapture::new())
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let initial = match &args.roll {
        Some(path) => RollState::from_json(&std::fs::read_to_string(path)?)?,
        None => {
            println!("No roll given, playing the built-in demo");
            demo_roll()
        }
    };

    let clock = open_clock(&config);
    let mut transport = TransportScheduler::with_config(clock.clone(), &config);
    let mut store = SequencerStore::new(initial, clock, &config)?;

    println!("\nMIDI Initialisation...");
    store.register_instrument(
        "piano",
        MidiInstrument::new(open_sink(&config), 0).into(),
    );
    store.register_instrument(
        "drum",
        Instrument::Drum(DrumKit::new(open_sink(&config))),
    );

    store.set_on_play_end(|| println!("\n=== Sequence finished ==="));
    store.set_on_data_change(|snapshot| {
        log::trace!("step {} / {:?}", snapshot.step, snapshot.status);
    });

    println!(
        "\nPlaying {} steps at {:.1} BPM ({} clock)\n",
        store.keyboard_length(),
        store.bpm(),
        config.clock_type
    );
    store.play(&mut transport)?;

    while store.is_playing() && transport.is_running() {
        // A failed tick only drops that tick
        if let Err(e) = transport.wait_and_pump(&mut store, MAX_WAIT) {
            log::error!("tick failed: {}", e);
        }
    }

    store.stop(&mut transport, false)?;
    Ok(())
}

fn main() {
    init_logging();

    println!("=== MyMusic Roll ===");
    println!("Step sequencer player {}\n", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
