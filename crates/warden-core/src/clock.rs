//! Injectable clock, per spec §6: "clock (returns monotonic and wall times —
//! always injected so tests can freeze time)".

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Current UTC wall-clock time.
    fn now(&self) -> DateTime<Utc>;
    /// A monotonic instant, used only for measuring elapsed durations.
    fn monotonic(&self) -> Instant;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that can be frozen and advanced manually, for deterministic tests.
///
/// `monotonic()` still returns real `Instant`s (there is no stable way to fake
/// `Instant` in stable Rust) but offset by the configured skew, so elapsed-time
/// assertions remain meaningful relative to `advance`.
pub struct FrozenClock {
    millis_since_epoch: AtomicI64,
    base_instant: Instant,
    base_millis: i64,
}

impl FrozenClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            millis_since_epoch: AtomicI64::new(now.timestamp_millis()),
            base_instant: Instant::now(),
            base_millis: now.timestamp_millis(),
        })
    }

    pub fn advance(&self, delta: Duration) {
        self.millis_since_epoch
            .fetch_add(delta.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.millis_since_epoch
            .store(now.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis_since_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn monotonic(&self) -> Instant {
        let millis = self.millis_since_epoch.load(Ordering::SeqCst);
        let delta = millis - self.base_millis;
        if delta >= 0 {
            self.base_instant + Duration::from_millis(delta as u64)
        } else {
            self.base_instant - Duration::from_millis((-delta) as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_clock_holds_still_until_advanced() {
        let clock = FrozenClock::at(DateTime::parse_from_rfc3339("2024-03-15T12:00:00Z").unwrap().with_timezone(&Utc));
        let t0 = clock.now();
        let t1 = clock.now();
        assert_eq!(t0, t1);
        clock.advance(Duration::from_secs(60));
        assert_eq!((clock.now() - t0).num_seconds(), 60);
    }
}
