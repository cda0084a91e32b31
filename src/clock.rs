use parking_lot::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of local time readings, in milliseconds.
///
/// `monotonic_ms` is measured from an arbitrary origin fixed when the clock is
/// created; `wall_ms` is milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn monotonic_ms(&self) -> f64;
    fn wall_ms(&self) -> f64;

    /// Offset that maps the monotonic reading onto local wall time.
    fn naive_offset_ms(&self) -> f64 {
        self.wall_ms() - self.monotonic_ms()
    }
}

#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn wall_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_millis(0))
            .as_secs_f64()
            * 1000.0
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<(f64, f64)>,
}

impl ManualClock {
    pub fn new(monotonic_ms: f64, wall_ms: f64) -> Self {
        Self { inner: Mutex::new((monotonic_ms, wall_ms)) }
    }

    /// Moves both readings forward by `ms`.
    pub fn advance_ms(&self, ms: f64) {
        let mut t = self.inner.lock();
        t.0 += ms;
        t.1 += ms;
    }

    /// Steps the wall clock alone, as an NTP correction on the host would.
    pub fn step_wall_ms(&self, ms: f64) {
        self.inner.lock().1 += ms;
    }
}

impl Clock for ManualClock {
    fn monotonic_ms(&self) -> f64 {
        self.inner.lock().0
    }

    fn wall_ms(&self) -> f64 {
        self.inner.lock().1
    }
}
