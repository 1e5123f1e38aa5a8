use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of the instants recorded against pending writes.
///
/// A node normally reads the system's monotonic clock. Tests freeze the
/// clock and advance it explicitly, so pending-write expiry is exercised
/// without sleeping.
#[derive(Debug, Clone)]
pub struct Clock {
    // None reads Instant::now(); Some is a pinned instant under test control.
    pinned: Arc<Mutex<Option<Instant>>>,
}

impl Clock {
    /// A clock which tracks the system's monotonic time.
    pub fn system() -> Self {
        Self {
            pinned: Arc::new(Mutex::new(None)),
        }
    }

    /// A clock frozen at the present instant. It moves only via `advance`.
    pub fn fixed() -> Self {
        Self {
            pinned: Arc::new(Mutex::new(Some(Instant::now()))),
        }
    }

    pub fn now(&self) -> Instant {
        self.pinned.lock().unwrap().unwrap_or_else(Instant::now)
    }

    /// Move the clock forward by `dur`. The clock is pinned afterward:
    /// subsequent readings return the advanced instant until the next call.
    pub fn advance(&self, dur: Duration) {
        let mut pinned = self.pinned.lock().unwrap();
        let now = pinned.unwrap_or_else(Instant::now);
        *pinned = Some(now + dur);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
