//! Compliance report data model, per spec §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use warden_hash::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Period,
    PointInTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "type")]
    pub period_type: PeriodType,
}

/// Framework identifiers accepted in a generation request, per spec §4.K.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkId {
    Soc2Type1,
    Soc2Type2,
    Iso27001,
    Hipaa,
    Gdpr,
    PciDss,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkInfo {
    pub name: String,
    pub id: FrameworkId,
    pub version: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlStatus {
    Compliant,
    PartiallyCompliant,
    NonCompliant,
    NotApplicable,
    NotEvaluated,
    Compensating,
}

/// A piece of evidence attached to a control in a rendered report, a
/// condensed projection of [`crate::evidence::CollectedEvidence`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRef {
    pub id: Uuid,
    pub source: String,
    pub verified: bool,
    pub relevance: f64,
    pub collected_at: DateTime<Utc>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStatus {
    Open,
    InProgress,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remediation {
    pub id: String,
    pub description: String,
    pub status: RemediationStatus,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub id: String,
    pub statement: String,
    pub attested_by: String,
    pub attested_at: DateTime<Utc>,
    /// A compensating control is an approved attestation that substitutes
    /// for direct evidence; its presence can override a control's status to
    /// `compensating`, per spec §4.K step 4.
    #[serde(default)]
    pub compensating_control: bool,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub control_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: ControlStatus,
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
    #[serde(default)]
    pub remediation: Vec<Remediation>,
    #[serde(default)]
    pub attestations: Vec<Attestation>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_controls: u32,
    pub by_status: BTreeMap<String, u32>,
    pub compliance_rate: f64,
    pub total_evidence: u32,
    pub verified_evidence: u32,
    pub open_remediations: u32,
    pub critical_findings: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    PendingReview,
    Approved,
    Published,
    Archived,
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSignature {
    pub content_hash: String,
    pub algorithm: String,
    pub signature: Signature,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub report_id: Uuid,
    pub schema_version: String,
    pub framework: FrameworkInfo,
    pub tenant_id: String,
    pub title: String,
    pub scope: String,
    pub period: Period,
    pub summary: ReportSummary,
    pub organization_name: String,
    pub controls: Vec<Control>,
    #[serde(default)]
    pub systems_in_scope: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub attestations: Vec<Attestation>,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<ReportSignature>,
}

impl Default for ReportStatus {
    fn default() -> Self {
        Self::Draft
    }
}
