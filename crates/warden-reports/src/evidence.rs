//! Evidence collector contract, component **J**.
//!
//! Grounded on `packages/governance/src/audit/evidence.rs`'s
//! `InfrastructureEvidenceCollector`/`EvidenceArtifact` shape, retargeted at
//! this crate's own audit/violation/policy sources instead of infrastructure
//! scanners, and made to produce chain-verified evidence for audit sources
//! per spec §4.J.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_audit::{AuditStore, LogKey, QueryFilter as AuditQueryFilter};
use warden_violations::{QueryFilter as ViolationQueryFilter, ViolationStore};

use crate::types::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    AuditLog,
    Violation,
    PolicyDecision,
    Attestation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedEvidence {
    pub id: Uuid,
    pub source: EvidenceSource,
    pub relevance: f64,
    pub control_ids: Vec<String>,
    pub verified: bool,
    pub collected_at: DateTime<Utc>,
    pub description: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct EvidenceQuery {
    pub tenant_id: String,
    pub controls: Vec<String>,
    pub period: Period,
}

#[async_trait]
pub trait EvidenceCollector: Send + Sync {
    async fn collect(&self, query: &EvidenceQuery) -> Vec<CollectedEvidence>;

    async fn collect_for_control(&self, tenant_id: &str, control: &str, period: &Period) -> Vec<CollectedEvidence> {
        let query = EvidenceQuery { tenant_id: tenant_id.to_string(), controls: vec![control.to_string()], period: period.clone() };
        self.collect(&query).await
    }

    async fn collect_for_controls(
        &self,
        tenant_id: &str,
        controls: &[String],
        period: &Period,
    ) -> HashMap<String, Vec<CollectedEvidence>> {
        let query = EvidenceQuery { tenant_id: tenant_id.to_string(), controls: controls.to_vec(), period: period.clone() };
        let all = self.collect(&query).await;
        let mut by_control: HashMap<String, Vec<CollectedEvidence>> = HashMap::new();
        for item in all {
            for control_id in &item.control_ids {
                by_control.entry(control_id.clone()).or_default().push(item.clone());
            }
        }
        by_control
    }
}

/// Collects audit-log and violation evidence, verifying every audit source's
/// hash chain before returning it as evidence (spec §4.J: "MUST produce
/// chain-verified evidence for any audit_log source").
pub struct GovernanceEvidenceCollector<A: AuditStore, V: ViolationStore> {
    audit_store: Arc<A>,
    violation_store: Arc<V>,
    /// `(scope, scopeId)` pairs searched for audit evidence, since the
    /// collector has no blanket "all logs for a tenant" query available.
    audit_scopes: Vec<(String, String)>,
}

impl<A: AuditStore, V: ViolationStore> GovernanceEvidenceCollector<A, V> {
    pub fn new(audit_store: Arc<A>, violation_store: Arc<V>, audit_scopes: Vec<(String, String)>) -> Self {
        Self { audit_store, violation_store, audit_scopes }
    }

    fn control_ids_for_audit(&self, control: Option<&str>) -> Vec<String> {
        match control {
            Some(c) => vec![c.to_string()],
            None => vec!["CC7.1".to_string()],
        }
    }
}

#[async_trait]
impl<A: AuditStore, V: ViolationStore> EvidenceCollector for GovernanceEvidenceCollector<A, V> {
    async fn collect(&self, query: &EvidenceQuery) -> Vec<CollectedEvidence> {
        let mut evidence = Vec::new();

        for (scope, scope_id) in &self.audit_scopes {
            let key = LogKey::new(query.tenant_id.clone(), scope.clone(), scope_id.clone());
            let filter = AuditQueryFilter { time_window: Some((query.period.start, query.period.end)), ..Default::default() };
            let entries = self.audit_store.query(&key, &filter).await;
            if entries.is_empty() {
                continue;
            }
            let verification = warden_audit::verify_chain(&entries, Utc::now());
            evidence.push(CollectedEvidence {
                id: Uuid::new_v4(),
                source: EvidenceSource::AuditLog,
                relevance: 1.0,
                control_ids: self.control_ids_for_audit(query.controls.first().map(String::as_str)),
                verified: verification.valid,
                collected_at: Utc::now(),
                description: format!("{} chain-verified audit entries for {}/{}", entries.len(), scope, scope_id),
                data: serde_json::json!({ "entryCount": entries.len(), "verified": verification.valid }),
            });
        }

        let violations = self
            .violation_store
            .query(&ViolationQueryFilter {
                tenant_id: Some(query.tenant_id.clone()),
                time_range: Some((query.period.start, query.period.end)),
                ..Default::default()
            })
            .await;

        if !violations.is_empty() {
            evidence.push(CollectedEvidence {
                id: Uuid::new_v4(),
                source: EvidenceSource::Violation,
                relevance: 0.6,
                control_ids: vec!["CC7.1".to_string()],
                verified: true,
                collected_at: Utc::now(),
                description: format!("{} violations recorded in period", violations.len()),
                data: serde_json::json!({ "violationCount": violations.len() }),
            });
        }

        evidence
    }
}
