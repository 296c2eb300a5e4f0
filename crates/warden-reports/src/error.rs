//! Stable report-subsystem error codes, per spec §6.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CUSTOM_FRAMEWORK_REQUIRED: framework = custom requires customFramework")]
    CustomFrameworkRequired,
    #[error("REPORT_NOT_FOUND: no report with id {0}")]
    ReportNotFound(Uuid),
    #[error("STORE_NOT_INITIALISED: report store has no entry for tenant {0}")]
    StoreNotInitialised(String),
    #[error("invalid cron expression: {0}")]
    InvalidCronExpression(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("invalid report request: {0}")]
    InvalidRequest(String),
    #[error("CANCELLED: operation cancelled before any side effect was made observable")]
    Cancelled,
    #[error("DEADLINE_EXCEEDED: schedule run exceeded its deadline")]
    DeadlineExceeded,
}

impl ReportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CustomFrameworkRequired => "CUSTOM_FRAMEWORK_REQUIRED",
            Self::ReportNotFound(_) => "REPORT_NOT_FOUND",
            Self::StoreNotInitialised(_) => "STORE_NOT_INITIALISED",
            Self::InvalidCronExpression(_) => "INVALID_CRON_EXPRESSION",
            Self::SigningFailed(_) => "SIGNING_FAILED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}
