//! Audit-specific error codes, per spec §6/§7.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("ERR_LOG_SEALED: log {0} is sealed; no further appends are permitted")]
    LogSealed(String),

    #[error("ERR_SEQUENCE_GAP: expected sequence {expected}, got {actual}")]
    SequenceGap { expected: u64, actual: u64 },

    #[error("ERR_CHAIN_MISMATCH: entry at sequence {sequence} has previousHash {actual:?}, expected {expected:?}")]
    ChainMismatch {
        sequence: u64,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("ERR_CONTENT_HASH_MISMATCH: entry at sequence {sequence} content hash does not match its recomputed value")]
    ContentHashMismatch { sequence: u64 },

    #[error("entry not found")]
    NotFound,

    #[error("ERR_CANCELLED: operation cancelled before any side effect was made observable")]
    Cancelled,
}

impl AuditError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::LogSealed(_) => "ERR_LOG_SEALED",
            Self::SequenceGap { .. } => "ERR_SEQUENCE_GAP",
            Self::ChainMismatch { .. } => "ERR_CHAIN_MISMATCH",
            Self::ContentHashMismatch { .. } => "ERR_CONTENT_HASH_MISMATCH",
            Self::NotFound => "ERR_NOT_FOUND",
            Self::Cancelled => "ERR_CANCELLED",
        }
    }
}
