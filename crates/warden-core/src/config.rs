//! Configuration loading.
//!
//! Grounded on `LLM-Dev-Ops-governance-dashboard`'s workspace dependency on
//! the `config` crate (the teacher's own library packages have no
//! configuration-loading crate of their own to draw from). Loads a layered
//! TOML file plus `WARDEN_*` environment overrides into one typed
//! [`CoreConfig`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Audit log defaults (component D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,
    #[serde(default)]
    pub signing_enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: default_hash_algorithm(),
            signing_enabled: false,
        }
    }
}

fn default_hash_algorithm() -> String {
    "sha256".to_string()
}

/// Violation detector defaults (component G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationsConfig {
    #[serde(default = "default_window_ms")]
    pub dedup_window_ms: u64,
    #[serde(default = "default_aggregation_window_ms")]
    pub aggregation_window_ms: u64,
    #[serde(default = "default_pattern_threshold")]
    pub pattern_threshold: u32,
    #[serde(default)]
    pub auto_escalate_critical: bool,
}

impl Default for ViolationsConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_window_ms(),
            aggregation_window_ms: default_aggregation_window_ms(),
            pattern_threshold: default_pattern_threshold(),
            auto_escalate_critical: false,
        }
    }
}

fn default_window_ms() -> u64 {
    60_000
}
fn default_aggregation_window_ms() -> u64 {
    300_000
}
fn default_pattern_threshold() -> u32 {
    3
}

/// Compliance report defaults (component K).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_max_evidence")]
    pub max_evidence_per_control: u32,
    #[serde(default = "default_run_deadline_minutes")]
    pub schedule_run_deadline_minutes: u64,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            max_evidence_per_control: default_max_evidence(),
            schedule_run_deadline_minutes: default_run_deadline_minutes(),
        }
    }
}

fn default_max_evidence() -> u32 {
    20
}
fn default_run_deadline_minutes() -> u64 {
    30
}

/// Top-level configuration for the governance core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub violations: ViolationsConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

impl CoreConfig {
    /// Load configuration from an optional TOML file, overlaid with
    /// `WARDEN_*` environment variables (e.g. `WARDEN_AUDIT__SIGNING_ENABLED=true`).
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("WARDEN")
                .separator("__")
                .try_parsing(true),
        );
        let built = builder.build()?;
        Ok(built.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.audit.hash_algorithm, "sha256");
        assert_eq!(cfg.violations.dedup_window_ms, 60_000);
        assert_eq!(cfg.reports.max_evidence_per_control, 20);
    }
}
