//! Stable violation-subsystem error codes, per spec §6.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViolationError {
    #[error("ERR_VIOLATION_NOT_FOUND: no violation with id {0}")]
    NotFound(Uuid),

    #[error("ERR_CANCELLED: operation cancelled before any side effect was made observable")]
    Cancelled,
}

impl ViolationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ERR_VIOLATION_NOT_FOUND",
            Self::Cancelled => "ERR_CANCELLED",
        }
    }
}
