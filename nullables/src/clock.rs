//! Nullable clock: deterministic monotonic time for testing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A monotonic clock that only advances when told to.
///
/// Election timers take an explicit `now: Instant`; tests read it from here
/// so passive delays, broadcast intervals and TTLs can be crossed without
/// sleeping.
pub struct NullClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl NullClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::new()
    }
}
