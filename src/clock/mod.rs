// Clock source - periodic tick generator driving the transport
// Prefers a background worker thread, falls back to a timeout loop polled by the host

mod worker;

pub use worker::ClockTick;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use worker::WorkerClock;

/// Lowest tick interval ever allowed, in seconds
pub const MIN_UPDATE_INTERVAL: f64 = 0.001;

/// Kind of primitive producing ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockType {
    /// Dedicated background thread (lowest jitter)
    #[default]
    Worker,
    /// Self-rescheduling timer on the host thread
    Timeout,
}

impl fmt::Display for ClockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockType::Worker => write!(f, "worker"),
            ClockType::Timeout => write!(f, "timeout"),
        }
    }
}

/// Self-rescheduling timer
///
/// The next deadline is armed from the instant a tick is observed, not from
/// the previous deadline, so lateness accumulates. Drift is not corrected.
struct TimeoutClock {
    interval: Duration,
    deadline: Instant,
}

impl TimeoutClock {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + interval,
        }
    }

    fn poll(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            self.deadline = now + self.interval;
            true
        } else {
            false
        }
    }

    fn wait(&mut self, max: Duration) -> bool {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        thread::sleep(remaining.min(max));
        self.poll()
    }
}

enum Backend {
    Idle,
    Worker(WorkerClock),
    Timeout(TimeoutClock),
}

/// Periodic tick source for the transport
///
/// Ticks are notifications only: the consumer calls [`ClockSource::poll`]
/// (or [`ClockSource::wait`]) from its own thread and decides what to run.
pub struct ClockSource {
    clock_type: ClockType,
    update_interval: f64,
    minimum_update_interval: f64,
    backend: Backend,
}

impl ClockSource {
    /// Create a stopped clock source
    ///
    /// The interval floor is one render quantum of the audio device
    /// (`buffer_size / sample_rate`), never below 1 ms.
    pub fn new(
        clock_type: ClockType,
        update_interval: f64,
        sample_rate: f64,
        buffer_size: usize,
    ) -> Self {
        let quantum = if sample_rate > 0.0 {
            buffer_size as f64 / sample_rate
        } else {
            0.0
        };

        let mut source = Self {
            clock_type,
            update_interval: MIN_UPDATE_INTERVAL,
            minimum_update_interval: quantum.max(MIN_UPDATE_INTERVAL),
            backend: Backend::Idle,
        };
        source.set_interval(update_interval);
        source
    }

    /// Build the clock primitive and start ticking
    /// Falls back to a timeout clock when the worker cannot be created.
    pub fn start(&mut self) {
        if self.is_active() {
            return;
        }

        let interval = self.interval_duration();
        self.backend = match self.clock_type {
            ClockType::Worker => match WorkerClock::spawn(interval) {
                Ok(worker) => Backend::Worker(worker),
                Err(e) => {
                    log::warn!("clock worker unavailable ({}), falling back to timeout", e);
                    self.clock_type = ClockType::Timeout;
                    Backend::Timeout(TimeoutClock::new(interval))
                }
            },
            ClockType::Timeout => Backend::Timeout(TimeoutClock::new(interval)),
        };

        log::debug!(
            "clock source started ({}, {:.1} ms)",
            self.clock_type,
            self.update_interval * 1000.0
        );
    }

    /// Set the tick interval in seconds (clamped to the floor)
    pub fn set_interval(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds } else { 0.0 };
        self.update_interval = seconds.max(self.minimum_update_interval);

        let interval = self.interval_duration();
        match &mut self.backend {
            Backend::Worker(worker) => worker.set_interval(interval),
            Backend::Timeout(timeout) => timeout.interval = interval,
            Backend::Idle => {}
        }
    }

    /// Current tick interval in seconds
    pub fn update_interval(&self) -> f64 {
        self.update_interval
    }

    pub fn minimum_update_interval(&self) -> f64 {
        self.minimum_update_interval
    }

    /// Type actually in use (after any fallback)
    pub fn clock_type(&self) -> ClockType {
        self.clock_type
    }

    /// Switch primitive: dispose the current one and rebuild the requested one
    pub fn set_type(&mut self, clock_type: ClockType) {
        let was_active = self.is_active();
        self.dispose();
        self.clock_type = clock_type;
        if was_active {
            self.start();
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.backend, Backend::Idle)
    }

    /// Consume pending tick notifications
    /// Returns true when at least one tick is due.
    pub fn poll(&mut self) -> bool {
        match &mut self.backend {
            Backend::Worker(worker) => worker.drain() > 0,
            Backend::Timeout(timeout) => timeout.poll(),
            Backend::Idle => false,
        }
    }

    /// Block the host thread until the next tick or `max`, whichever is first
    pub fn wait(&mut self, max: Duration) -> bool {
        match &mut self.backend {
            Backend::Worker(worker) => worker.wait(max) > 0,
            Backend::Timeout(timeout) => timeout.wait(max),
            Backend::Idle => false,
        }
    }

    /// Stop ticking; safe to call any number of times
    pub fn dispose(&mut self) {
        if let Backend::Worker(mut worker) = std::mem::replace(&mut self.backend, Backend::Idle) {
            worker.terminate();
        }
    }

    fn interval_duration(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval)
    }
}

impl Drop for ClockSource {
    fn drop(&mut self) {
        self.dispose();
    }
}
