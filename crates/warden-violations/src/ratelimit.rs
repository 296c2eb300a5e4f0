//! Per-channel alert rate limiting, component **H**.
//!
//! Grounded on `packages/arbiter/src/bulkhead.rs`'s `parking_lot`-guarded
//! counter idiom, retargeted from concurrency slots to a fixed time window.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// `{maxAlerts, windowMs}`, per spec §4.H.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_alerts: u64,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_alerts: 10, window_ms: 60_000 }
    }
}

struct Window {
    started_at: DateTime<Utc>,
    count: u64,
}

/// A fixed-window rate limiter keyed by `(channel, tenant)`.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, windows: Mutex::new(HashMap::new()) }
    }

    /// Records one attempt and reports whether it is within the window's
    /// budget. The `k+1`-th call inside an unexpired window is rate limited;
    /// a call after the window has elapsed resets the count to 1.
    pub fn check(&self, channel: &str, tenant_id: &str, now: DateTime<Utc>) -> bool {
        let mut windows = self.windows.lock();
        let key = (channel.to_string(), tenant_id.to_string());
        let window = windows.entry(key).or_insert_with(|| Window { started_at: now, count: 0 });

        if (now - window.started_at).num_milliseconds() as u64 > self.config.window_ms {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.config.max_alerts {
            return false;
        }

        window.count += 1;
        true
    }
}
