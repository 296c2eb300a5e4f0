//! Cooperative cancellation and deadlines, per spec §5: "Every externally
//! visible operation accepts a cancellation signal... On cancellation before
//! persistence, no side effect is made observable. After persistence,
//! cancellation is ignored for that call."

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A clone-able, shareable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Never-cancelled token, for call sites that do not want cooperative
    /// cancellation (e.g. synchronous property tests).
    pub fn none() -> Self {
        Self::default()
    }
}

/// An optional point in monotonic time after which an operation must give up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn after(duration: std::time::Duration) -> Self {
        Self(Some(Instant::now() + duration))
    }

    pub fn is_expired(&self) -> bool {
        self.0.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// The underlying instant, for callers that need to hand the deadline to
    /// another timing primitive (e.g. `tokio::time::timeout_at`).
    pub fn instant(&self) -> Option<Instant> {
        self.0
    }
}
