//! Shared error taxonomy, per spec §7 ERROR HANDLING DESIGN.
//!
//! Each crate keeps its own `thiserror` enum for its domain-specific variants
//! (`PolicyError`, `AuditError`, ...) and converts into `CoreError` at the
//! boundary where a caller needs the coarse classification (validation vs.
//! state vs. integrity vs. capacity vs. external vs. cancellation).

use thiserror::Error;

/// Stable, coarse error classification shared across the governance core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: policy document, report request, audit entry shape.
    /// Carries a stable machine code and a human path/description.
    #[error("validation error [{code}] at {path}: {message}")]
    Validation {
        code: &'static str,
        path: String,
        message: String,
    },

    /// Operation forbidden in the current state (sealed log, unknown
    /// schedule, missing parent policy).
    #[error("state error [{code}]: {message}")]
    State { code: &'static str, message: String },

    /// Hash mismatch, chain break, Merkle verification failure. Always fatal
    /// for the enclosing operation; never silently repaired.
    #[error("integrity error: {message}")]
    Integrity { message: String },

    /// Rate-limit or concurrency limit exceeded.
    #[error("capacity exceeded, retry after {retry_after_ms}ms: {message}")]
    Capacity {
        message: String,
        retry_after_ms: u64,
    },

    /// Alert channel failure, store I/O failure. Caller decides on retry.
    #[error("external error after {duration_ms}ms: {message}")]
    External { message: String, duration_ms: u64 },

    /// The operation was cancelled before any side effect became observable.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's deadline elapsed before it could complete.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl CoreError {
    pub fn validation(code: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn state(code: &'static str, message: impl Into<String>) -> Self {
        Self::State {
            code,
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Machine-stable code for this error, where one exists (cancellation and
    /// deadline errors are distinguished by variant, not by code string, per
    /// spec §7's "distinguishable from other errors").
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Validation { code, .. } | Self::State { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Capacity { .. } | Self::External { .. })
    }
}
