// Audio timing - the global audio clock read by the transport and instruments
// Time is expressed in seconds on the audio device timeline

use super::AudioError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Render quantum assumed when the device does not report its buffer size
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Sample rate assumed by clocks that are not attached to a device
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Global audio-time source
///
/// `now()` is monotonic and only advances once the clock has been resumed.
/// `resume()` must be called before any sound is produced and is idempotent.
pub trait AudioClock {
    /// Current audio time in seconds
    fn now(&self) -> f64;

    /// Start (or restart) the clock
    fn resume(&self) -> Result<(), AudioError>;

    /// Whether `resume()` has been called
    fn is_running(&self) -> bool;

    fn sample_rate(&self) -> f64 {
        DEFAULT_SAMPLE_RATE
    }

    /// Frames rendered per device callback
    fn buffer_size(&self) -> usize {
        DEFAULT_BUFFER_SIZE
    }
}

/// Shared frame counter advanced by the audio callback
///
/// This is the hardware clock: one frame rendered by the device is
/// `1 / sample_rate` seconds of audio time.
#[derive(Clone)]
pub struct AudioTiming {
    /// Frames rendered since the clock was resumed (incremented by audio callback)
    frame_position: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    sample_rate: f64,
    buffer_size: usize,
}

impl AudioTiming {
    pub fn new(sample_rate: f64, buffer_size: usize) -> Self {
        Self {
            frame_position: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            sample_rate,
            buffer_size,
        }
    }

    /// Get current frame position (called from the host thread)
    pub fn current_frame(&self) -> u64 {
        self.frame_position.load(Ordering::Relaxed)
    }

    /// Advance frame position (called from audio callback)
    /// Frames rendered while suspended do not count.
    pub fn advance(&self, frames: usize) {
        if self.running.load(Ordering::Relaxed) {
            self.frame_position
                .fetch_add(frames as u64, Ordering::Relaxed);
        }
    }

    /// Convert a frame count to seconds
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate
    }
}

impl AudioClock for AudioTiming {
    fn now(&self) -> f64 {
        self.frames_to_seconds(self.current_frame())
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// Monotonic clock used when no audio device is available
#[derive(Debug, Default)]
pub struct SystemClock {
    origin: OnceLock<Instant>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin
            .get()
            .map(|origin| origin.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.origin.get_or_init(Instant::now);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.origin.get().is_some()
    }
}

/// Clock driven by hand, for tests and offline rendering
///
/// Clones share the same time value.
#[derive(Debug, Clone)]
pub struct ManualClock {
    seconds_bits: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    sample_rate: f64,
    buffer_size: usize,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::with_device(DEFAULT_SAMPLE_RATE, DEFAULT_BUFFER_SIZE)
    }

    /// Pretend to be a device with the given render settings
    pub fn with_device(sample_rate: f64, buffer_size: usize) -> Self {
        Self {
            seconds_bits: Arc::new(AtomicU64::new(0.0f64.to_bits())),
            running: Arc::new(AtomicBool::new(false)),
            sample_rate,
            buffer_size,
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Relaxed))
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}
