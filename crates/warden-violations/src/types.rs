//! Violation and pattern data model, per spec §3.
//!
//! Grounded on `packages/arbiter/src/escalation/triggers.rs`'s
//! `EscalationLevel`/`TriggerResult` shape, retargeted at the four
//! violation sources and ordered severities this spec requires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_audit::{Action, Actor, Resource};

/// The four detection sources, per spec §3/§4.G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationType {
    PolicyDenied,
    ApprovalBypassed,
    LimitExceeded,
    AnomalyDetected,
}

/// Totally ordered severity, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Lifecycle status; transitions are monotonic except that `dismissed` and
/// `resolved` are terminal unless reopened administratively (out of scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationStatus {
    Detected,
    Acknowledged,
    Resolved,
    Dismissed,
    Escalated,
}

/// Source-specific detail payload, a tagged variant per spec §9's
/// "any-shape details" note applied narrowly to the four known sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ViolationDetails {
    PolicyDenied {
        rule_id: String,
        policy_id: String,
        effect: String,
    },
    ApprovalBypassed {
        required_approvers: u32,
        actual_approvers: u32,
    },
    LimitExceeded {
        limit: f64,
        actual: f64,
        limit_type: String,
    },
    AnomalyDetected {
        confidence: f64,
        score: f64,
        signal_id: String,
    },
}

impl ViolationDetails {
    pub fn violation_type(&self) -> ViolationType {
        match self {
            Self::PolicyDenied { .. } => ViolationType::PolicyDenied,
            Self::ApprovalBypassed { .. } => ViolationType::ApprovalBypassed,
            Self::LimitExceeded { .. } => ViolationType::LimitExceeded,
            Self::AnomalyDetected { .. } => ViolationType::AnomalyDetected,
        }
    }

    /// The identifier fingerprinting keys on: rule id, or a signal id for
    /// anomalies, falling back to the limit type for rate limits.
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::PolicyDenied { rule_id, .. } => rule_id,
            Self::ApprovalBypassed { .. } => "approval",
            Self::LimitExceeded { limit_type, .. } => limit_type,
            Self::AnomalyDetected { signal_id, .. } => signal_id,
        }
    }
}

/// Free-form audit trail on a violation, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

/// One detected violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub id: Uuid,
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub source: String,
    pub status: ViolationStatus,
    pub actor: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    pub action: Action,
    pub summary: String,
    pub details: ViolationDetails,
    pub detected_at: DateTime<Utc>,
    pub metadata: ViolationMetadata,
    /// Set by the detector's fingerprinting step; not part of the wire
    /// contract `Violation` shape in spec §3, but retained so dedup and
    /// pattern aggregation don't need to recompute it from stale fields.
    #[serde(skip)]
    pub fingerprint: String,
}

/// A virtual aggregation over stored violations, produced on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub group_key: String,
    pub count: u64,
    pub unique_actors: u64,
    pub unique_resources: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Required output shape for a regression task's expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedOutput {
    pub min_score: u32,
    pub required_keywords: Vec<String>,
    pub required_actions: Vec<String>,
}

/// SLA tracking for an incident-to-regression task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sla {
    pub target_hours: f64,
    pub actual_hours: f64,
    pub within_sla: bool,
}

/// Provenance of a `GoldenTask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenTaskSource {
    pub violation_id: Uuid,
    pub violation_type: ViolationType,
    pub severity: Severity,
}

/// A reproducible regression-test specification derived from a resolved incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenTask {
    pub id: String,
    pub workflow: String,
    pub source: GoldenTaskSource,
    pub input: serde_json::Value,
    pub expected_output: ExpectedOutput,
    pub sla: Sla,
    pub tags: Vec<String>,
}
