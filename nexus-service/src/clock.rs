//! A `Clock` capability injected into the service root and threaded
//! through components, rather than a process-wide mutable global — the
//! resolution of spec.md §9's "globally mutable test clock" design note.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Anything that can report the current time.
pub trait Clock: Send + Sync {
    /// The current time, as this clock sees it.
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock: `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock tests can advance or pin, without any process-wide mutable
/// state — construct one per test and inject it via [`Arc<dyn Clock>`].
#[derive(Clone)]
pub struct TestClock {
    micros_since_epoch: Arc<AtomicI64>,
}

impl TestClock {
    /// A clock pinned at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        TestClock { micros_since_epoch: Arc::new(AtomicI64::new(start.timestamp_micros())) }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: chrono::Duration) {
        self.micros_since_epoch.fetch_add(duration.num_microseconds().unwrap_or(0), Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros_since_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp_micros(micros).expect("test clock value always in range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_independently_of_wall_clock() {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let clock = TestClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::hours(6));
        assert_eq!(clock.now(), start + chrono::Duration::hours(6));
    }
}
