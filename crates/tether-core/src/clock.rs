//! Clock sources for elapsed-time decisions.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for every time-limit decision.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock with microsecond resolution.
///
/// Clones share the same instant, so a test can keep one handle and move time
/// forward (or backward) under a running engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current_micros: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_micros: Arc::new(AtomicI64::new(start.timestamp_micros())),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.current_micros
            .store(instant.timestamp_micros(), Ordering::SeqCst);
    }

    /// Move time by `delta`; negative values simulate a clock moved backward.
    ///
    /// Saturates instead of wrapping.
    pub fn advance(&self, delta: Duration) {
        let micros = delta.num_microseconds().unwrap_or(if delta < Duration::zero() {
            i64::MIN
        } else {
            i64::MAX
        });
        // The closure always returns `Some`, so the update cannot fail.
        let _ = self
            .current_micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(micros))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.current_micros.load(Ordering::SeqCst);
        DateTime::from_timestamp_micros(micros).unwrap_or(if micros < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }
}
