use std::time::{Duration, Instant};

/// The source of time for polling and backoff.
///
/// All waiting done by the reconciler goes through this trait, which allows tests to advance time
/// instantly.
pub trait Clock {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

/// A [`Clock`] backed by the system's monotonic clock which blocks the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
