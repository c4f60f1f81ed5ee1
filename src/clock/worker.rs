// Worker clock - background thread posting periodic ticks to the host thread
// Only the interval crosses the thread boundary; ticks flow one way

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pending ticks kept before the worker starts dropping them
const TICK_CAPACITY: usize = 64;

/// One tick notification
#[derive(Debug, Clone, Copy)]
pub struct ClockTick {
    pub emitted_at: Instant,
}

#[cfg(test)]
thread_local! {
    /// Simulates a host without background threads
    pub(crate) static FAIL_SPAWN: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

pub(crate) struct WorkerClock {
    interval_micros: Arc<AtomicU64>,
    alive: Arc<AtomicBool>,
    ticks: HeapCons<ClockTick>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerClock {
    /// Spawn the ticking thread
    /// Ticks unpark the calling thread, which is the one expected to poll.
    pub(crate) fn spawn(interval: Duration) -> io::Result<Self> {
        #[cfg(test)]
        if FAIL_SPAWN.with(|fail| fail.get()) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "background threads disabled",
            ));
        }

        let interval_micros = Arc::new(AtomicU64::new(interval.as_micros() as u64));
        let alive = Arc::new(AtomicBool::new(true));
        let (mut producer, ticks) = HeapRb::<ClockTick>::new(TICK_CAPACITY).split();
        let host = thread::current();

        let thread_interval = Arc::clone(&interval_micros);
        let thread_alive = Arc::clone(&alive);

        let handle = thread::Builder::new()
            .name("roll-clock".to_string())
            .spawn(move || {
                while thread_alive.load(Ordering::Acquire) {
                    let period = Duration::from_micros(thread_interval.load(Ordering::Relaxed));
                    let deadline = Instant::now() + period;

                    // park_timeout may wake early; sleep out the remainder
                    loop {
                        if !thread_alive.load(Ordering::Acquire) {
                            return;
                        }
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        thread::park_timeout(deadline - now);
                    }

                    // A full buffer means the host is behind; it drains everything per poll anyway
                    let _ = producer.try_push(ClockTick {
                        emitted_at: Instant::now(),
                    });
                    host.unpark();
                }
            })?;

        Ok(Self {
            interval_micros,
            alive,
            ticks,
            handle: Some(handle),
        })
    }

    pub(crate) fn set_interval(&self, interval: Duration) {
        self.interval_micros
            .store(interval.as_micros() as u64, Ordering::Relaxed);
    }

    /// Drain pending ticks, returning how many arrived
    pub(crate) fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(tick) = self.ticks.try_pop() {
            let late = tick.emitted_at.elapsed();
            if late > Duration::from_millis(50) {
                log::warn!("clock tick consumed {:?} late", late);
            }
            count += 1;
        }
        count
    }

    /// Park the host thread until a tick arrives or `max` elapses
    pub(crate) fn wait(&mut self, max: Duration) -> usize {
        let pending = self.drain();
        if pending > 0 {
            return pending;
        }
        thread::park_timeout(max);
        self.drain()
    }

    pub(crate) fn terminate(&mut self) {
        self.alive.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::warn!("clock worker panicked");
            }
        }
    }
}

impl Drop for WorkerClock {
    fn drop(&mut self) {
        self.terminate();
    }
}
