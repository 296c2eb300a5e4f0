//! Stable validator/engine error codes, per spec §4.E/§6.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One structural or semantic problem found while validating a policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: &'static str,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("MIGRATION_FAILED: document still fails schema validation after migration")]
    MigrationFailed,

    #[error("ErrEvaluationFailed: custom condition in rule {rule_id} raised an error: {message}")]
    EvaluationFailed { rule_id: String, message: String },

    #[error("CUSTOM_FRAMEWORK_REQUIRED")]
    CustomFrameworkRequired,
}

impl PolicyError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MigrationFailed => "MIGRATION_FAILED",
            Self::EvaluationFailed { .. } => "ERR_EVALUATION_FAILED",
            Self::CustomFrameworkRequired => "CUSTOM_FRAMEWORK_REQUIRED",
        }
    }
}
