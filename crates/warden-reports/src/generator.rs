//! Report generator, component **K** step 1-8.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;
use warden_core::CancellationToken;
use warden_hash::{canonical_bytes_of, digest, HashAlgorithm, PrivateKey};

use crate::error::ReportError;
use crate::evidence::EvidenceCollector;
use crate::templates::{self, FrameworkTemplate};
use crate::types::{
    Attestation, ComplianceReport, Control, ControlStatus, EvidenceRef, FrameworkId, FrameworkInfo, Period,
    Remediation, RemediationStatus, ReportSignature, ReportStatus, ReportSummary,
};

const SCHEMA_VERSION: &str = "1.0";
const DEFAULT_MAX_EVIDENCE_PER_CONTROL: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
    Both,
}

pub struct GenerateRequest<'a> {
    pub tenant_id: String,
    pub framework: FrameworkId,
    pub custom_framework: Option<FrameworkTemplate>,
    pub organization_name: String,
    pub period: Period,
    pub include_control_ids: Option<Vec<String>>,
    pub exclude_control_ids: Option<Vec<String>>,
    pub collect_evidence: bool,
    pub max_evidence_per_control: Option<u32>,
    /// Open remediation tasks and attestations, keyed by control id. These
    /// have no automated evidence source (spec §4.K step 4 names them as
    /// inputs to status derivation, not as a `CollectedEvidence` source),
    /// so callers supply them directly, typically sourced from a
    /// ticketing or attestation-tracking system outside this crate.
    pub remediation_by_control: HashMap<String, Vec<Remediation>>,
    pub attestations_by_control: HashMap<String, Vec<Attestation>>,
    pub output_format: OutputFormat,
    pub generated_by: String,
    pub signing_key: Option<&'a PrivateKey>,
    pub status_override: Option<ReportStatus>,
}

pub struct GeneratedReport {
    pub report: ComplianceReport,
    pub markdown: Option<String>,
}

pub struct ReportGenerator<C: EvidenceCollector> {
    collector: C,
}

impl<C: EvidenceCollector> ReportGenerator<C> {
    pub fn new(collector: C) -> Self {
        Self { collector }
    }

    /// Builds a compliance report. Accepts a [`CancellationToken`], checked
    /// before evidence collection and again before signing — the two steps
    /// with externally observable effects (a remote collector call and a
    /// cryptographic signature), per spec §5.
    pub async fn generate(
        &self,
        request: GenerateRequest<'_>,
        cancellation: &CancellationToken,
    ) -> Result<GeneratedReport, ReportError> {
        if cancellation.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        let template = match request.framework {
            FrameworkId::Custom => request.custom_framework.clone().ok_or(ReportError::CustomFrameworkRequired)?,
            other => templates::template_for(other).expect("built-in framework always has a template"),
        };

        let mut control_defs = template.controls.clone();
        if let Some(include) = &request.include_control_ids {
            control_defs.retain(|c| include.contains(&c.control_id.to_string()));
        }
        if let Some(exclude) = &request.exclude_control_ids {
            control_defs.retain(|c| !exclude.contains(&c.control_id.to_string()));
        }

        let max_evidence = request.max_evidence_per_control.unwrap_or(DEFAULT_MAX_EVIDENCE_PER_CONTROL).clamp(1, 100) as usize;

        if cancellation.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        let evidence_by_control = if request.collect_evidence {
            let control_ids: Vec<String> = control_defs.iter().map(|c| c.control_id.to_string()).collect();
            self.collector.collect_for_controls(&request.tenant_id, &control_ids, &request.period).await
        } else {
            Default::default()
        };

        let mut controls = Vec::new();
        for def in &control_defs {
            let mut evidence: Vec<EvidenceRef> = evidence_by_control
                .get(def.control_id)
                .map(|items| {
                    items
                        .iter()
                        .take(max_evidence)
                        .map(|e| EvidenceRef {
                            id: e.id,
                            source: format!("{:?}", e.source),
                            verified: e.verified,
                            relevance: e.relevance,
                            collected_at: e.collected_at,
                            description: e.description.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            evidence.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));

            let remediation = request.remediation_by_control.get(def.control_id).cloned().unwrap_or_default();
            let attestations = request.attestations_by_control.get(def.control_id).cloned().unwrap_or_default();
            let status = classify_control(&evidence, request.collect_evidence, &remediation, &attestations);

            controls.push(Control {
                control_id: def.control_id.to_string(),
                title: def.title.to_string(),
                description: def.description.to_string(),
                category: def.category.to_string(),
                priority: def.priority.to_string(),
                status,
                evidence,
                remediation,
                attestations,
                notes: Vec::new(),
                tags: Vec::new(),
            });
        }

        let summary = summarize(&controls);

        let mut report = ComplianceReport {
            report_id: Uuid::new_v4(),
            schema_version: SCHEMA_VERSION.to_string(),
            framework: FrameworkInfo {
                name: template.name.to_string(),
                id: template.id,
                version: template.version.to_string(),
                description: template.description.to_string(),
            },
            tenant_id: request.tenant_id.clone(),
            title: format!("{} Compliance Report", template.name),
            scope: "organization".to_string(),
            period: request.period.clone(),
            summary,
            organization_name: request.organization_name.clone(),
            controls,
            systems_in_scope: Vec::new(),
            exclusions: Vec::new(),
            attestations: Vec::new(),
            generated_at: Utc::now(),
            generated_by: request.generated_by.clone(),
            status: request.status_override.unwrap_or(ReportStatus::Draft),
            signature: None,
        };

        if let Some(key) = request.signing_key {
            if cancellation.is_cancelled() {
                return Err(ReportError::Cancelled);
            }
            report.status = request.status_override.unwrap_or(ReportStatus::Approved);
            let bytes = canonical_bytes_of(&report).map_err(|e| ReportError::SigningFailed(e.to_string()))?;
            let content_hash = digest(&bytes, HashAlgorithm::Sha256);
            let signature = key.sign(content_hash.as_bytes()).map_err(|e| ReportError::SigningFailed(e.to_string()))?;
            report.signature = Some(ReportSignature {
                content_hash,
                algorithm: format!("{:?}", key.algorithm()),
                signature,
                signed_at: Utc::now(),
            });
        }

        let markdown = match request.output_format {
            OutputFormat::Markdown | OutputFormat::Both => Some(render_markdown(&report)),
            OutputFormat::Json => None,
        };

        Ok(GeneratedReport { report, markdown })
    }
}

/// Per spec §4.K step 4: an approved compensating control overrides to
/// `compensating`; an open remediation task overrides to `nonCompliant`;
/// otherwise status follows from evidence verification.
fn classify_control(
    evidence: &[EvidenceRef],
    evidence_requested: bool,
    remediation: &[Remediation],
    attestations: &[Attestation],
) -> ControlStatus {
    if attestations.iter().any(|a| a.approved && a.compensating_control) {
        return ControlStatus::Compensating;
    }
    if remediation.iter().any(|r| r.status == RemediationStatus::Open) {
        return ControlStatus::NonCompliant;
    }
    if !evidence_requested || evidence.is_empty() {
        return ControlStatus::NotEvaluated;
    }
    if evidence.iter().all(|e| e.verified) {
        ControlStatus::Compliant
    } else if evidence.iter().any(|e| e.verified) {
        ControlStatus::PartiallyCompliant
    } else {
        ControlStatus::NonCompliant
    }
}

fn summarize(controls: &[Control]) -> ReportSummary {
    let mut by_status = std::collections::BTreeMap::new();
    let mut total_evidence = 0u32;
    let mut verified_evidence = 0u32;
    let mut open_remediations = 0u32;
    let mut critical_findings = 0u32;

    for control in controls {
        *by_status.entry(format!("{:?}", control.status)).or_insert(0u32) += 1;
        total_evidence += control.evidence.len() as u32;
        verified_evidence += control.evidence.iter().filter(|e| e.verified).count() as u32;
        open_remediations += control.remediation.iter().filter(|r| r.status == crate::types::RemediationStatus::Open).count() as u32;
        if control.status == ControlStatus::NonCompliant && control.priority == "high" {
            critical_findings += 1;
        }
    }

    let not_applicable = controls.iter().filter(|c| c.status == ControlStatus::NotApplicable).count() as u32;
    let compliant = controls.iter().filter(|c| c.status == ControlStatus::Compliant).count() as u32;
    let denominator = controls.len() as u32 - not_applicable;
    let compliance_rate = if denominator == 0 { 0.0 } else { compliant as f64 / denominator as f64 };

    ReportSummary {
        total_controls: controls.len() as u32,
        by_status,
        compliance_rate,
        total_evidence,
        verified_evidence,
        open_remediations,
        critical_findings,
    }
}

fn render_markdown(report: &ComplianceReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", report.title));
    out.push_str(&format!("**Organization:** {}\n\n", report.organization_name));
    out.push_str(&format!("**Framework:** {} ({})\n\n", report.framework.name, report.framework.version));
    out.push_str(&format!("**Period:** {} — {}\n\n", report.period.start.to_rfc3339(), report.period.end.to_rfc3339()));
    out.push_str(&format!("**Compliance rate:** {:.1}%\n\n", report.summary.compliance_rate * 100.0));

    for control in &report.controls {
        out.push_str(&format!("## {} — {}\n\n", control.control_id, control.title));
        out.push_str(&format!("Status: `{:?}`\n\n", control.status));
        if control.evidence.is_empty() {
            out.push_str("No evidence collected.\n\n");
        } else {
            out.push_str("| Source | Verified | Description |\n|---|---|---|\n");
            for e in &control.evidence {
                out.push_str(&format!("| {} | {} | {} |\n", e.source, e.verified, e.description));
            }
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{CollectedEvidence, EvidenceQuery, EvidenceSource};
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FakeCollector {
        items: Vec<CollectedEvidence>,
    }

    #[async_trait]
    impl EvidenceCollector for FakeCollector {
        async fn collect(&self, _query: &EvidenceQuery) -> Vec<CollectedEvidence> {
            self.items.clone()
        }
    }

    fn sample_period() -> Period {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Period { start: now, end: now + chrono::Duration::days(30), period_type: crate::types::PeriodType::Period }
    }

    #[tokio::test]
    async fn custom_framework_without_template_is_rejected() {
        let generator = ReportGenerator::new(FakeCollector { items: vec![] });
        let request = GenerateRequest {
            tenant_id: "t1".to_string(),
            framework: FrameworkId::Custom,
            custom_framework: None,
            organization_name: "Acme".to_string(),
            period: sample_period(),
            include_control_ids: None,
            exclude_control_ids: None,
            collect_evidence: false,
            max_evidence_per_control: None,
            remediation_by_control: HashMap::new(),
            attestations_by_control: HashMap::new(),
            output_format: OutputFormat::Json,
            generated_by: "system".to_string(),
            signing_key: None,
            status_override: None,
        };

        let err = generator.generate(request, &CancellationToken::none()).await.unwrap_err();
        assert_eq!(err.code(), "CUSTOM_FRAMEWORK_REQUIRED");
    }

    #[tokio::test]
    async fn verified_evidence_marks_control_compliant() {
        let evidence = CollectedEvidence {
            id: Uuid::new_v4(),
            source: EvidenceSource::AuditLog,
            relevance: 1.0,
            control_ids: vec!["CC6.1".to_string()],
            verified: true,
            collected_at: Utc::now(),
            description: "verified chain".to_string(),
            data: serde_json::json!({}),
        };
        let generator = ReportGenerator::new(FakeCollector { items: vec![evidence] });
        let request = GenerateRequest {
            tenant_id: "t1".to_string(),
            framework: FrameworkId::Soc2Type2,
            custom_framework: None,
            organization_name: "Acme".to_string(),
            period: sample_period(),
            include_control_ids: Some(vec!["CC6.1".to_string()]),
            exclude_control_ids: None,
            collect_evidence: true,
            max_evidence_per_control: None,
            remediation_by_control: HashMap::new(),
            attestations_by_control: HashMap::new(),
            output_format: OutputFormat::Both,
            generated_by: "system".to_string(),
            signing_key: None,
            status_override: None,
        };

        let generated = generator.generate(request, &CancellationToken::none()).await.unwrap();
        assert_eq!(generated.report.controls.len(), 1);
        assert_eq!(generated.report.controls[0].status, ControlStatus::Compliant);
        assert!(generated.markdown.is_some());
    }

    #[tokio::test]
    async fn signing_transitions_draft_to_approved() {
        let key = PrivateKey::from_ed25519_bytes(&[3u8; 32]);
        let generator = ReportGenerator::new(FakeCollector { items: vec![] });
        let request = GenerateRequest {
            tenant_id: "t1".to_string(),
            framework: FrameworkId::Iso27001,
            custom_framework: None,
            organization_name: "Acme".to_string(),
            period: sample_period(),
            include_control_ids: None,
            exclude_control_ids: None,
            collect_evidence: false,
            max_evidence_per_control: None,
            remediation_by_control: HashMap::new(),
            attestations_by_control: HashMap::new(),
            output_format: OutputFormat::Json,
            generated_by: "system".to_string(),
            signing_key: Some(&key),
            status_override: None,
        };

        let generated = generator.generate(request, &CancellationToken::none()).await.unwrap();
        assert_eq!(generated.report.status, ReportStatus::Approved);
        assert!(generated.report.signature.is_some());
    }

    #[tokio::test]
    async fn open_remediation_overrides_verified_evidence_to_non_compliant() {
        let evidence = CollectedEvidence {
            id: Uuid::new_v4(),
            source: EvidenceSource::AuditLog,
            relevance: 1.0,
            control_ids: vec!["CC6.1".to_string()],
            verified: true,
            collected_at: Utc::now(),
            description: "verified chain".to_string(),
            data: serde_json::json!({}),
        };
        let generator = ReportGenerator::new(FakeCollector { items: vec![evidence] });
        let mut remediation_by_control = HashMap::new();
        remediation_by_control.insert(
            "CC6.1".to_string(),
            vec![Remediation { id: "r1".to_string(), description: "rotate leaked key".to_string(), status: RemediationStatus::Open, due_date: None }],
        );
        let request = GenerateRequest {
            tenant_id: "t1".to_string(),
            framework: FrameworkId::Soc2Type2,
            custom_framework: None,
            organization_name: "Acme".to_string(),
            period: sample_period(),
            include_control_ids: Some(vec!["CC6.1".to_string()]),
            exclude_control_ids: None,
            collect_evidence: true,
            max_evidence_per_control: None,
            remediation_by_control,
            attestations_by_control: HashMap::new(),
            output_format: OutputFormat::Json,
            generated_by: "system".to_string(),
            signing_key: None,
            status_override: None,
        };

        let generated = generator.generate(request, &CancellationToken::none()).await.unwrap();
        assert_eq!(generated.report.controls[0].status, ControlStatus::NonCompliant);
    }

    #[tokio::test]
    async fn approved_compensating_attestation_overrides_to_compensating() {
        let generator = ReportGenerator::new(FakeCollector { items: vec![] });
        let mut attestations_by_control = HashMap::new();
        attestations_by_control.insert(
            "CC6.1".to_string(),
            vec![Attestation {
                id: "a1".to_string(),
                statement: "network segmentation substitutes for MFA on this legacy system".to_string(),
                attested_by: "ciso@acme.test".to_string(),
                attested_at: Utc::now(),
                compensating_control: true,
                approved: true,
            }],
        );
        let request = GenerateRequest {
            tenant_id: "t1".to_string(),
            framework: FrameworkId::Soc2Type2,
            custom_framework: None,
            organization_name: "Acme".to_string(),
            period: sample_period(),
            include_control_ids: Some(vec!["CC6.1".to_string()]),
            exclude_control_ids: None,
            collect_evidence: false,
            max_evidence_per_control: None,
            remediation_by_control: HashMap::new(),
            attestations_by_control,
            output_format: OutputFormat::Json,
            generated_by: "system".to_string(),
            signing_key: None,
            status_override: None,
        };

        let generated = generator.generate(request, &CancellationToken::none()).await.unwrap();
        assert_eq!(generated.report.controls[0].status, ControlStatus::Compensating);
    }

    #[tokio::test]
    async fn cancelled_token_rejects_generate_before_any_side_effect() {
        let generator = ReportGenerator::new(FakeCollector { items: vec![] });
        let request = GenerateRequest {
            tenant_id: "t1".to_string(),
            framework: FrameworkId::Soc2Type2,
            custom_framework: None,
            organization_name: "Acme".to_string(),
            period: sample_period(),
            include_control_ids: None,
            exclude_control_ids: None,
            collect_evidence: true,
            max_evidence_per_control: None,
            remediation_by_control: HashMap::new(),
            attestations_by_control: HashMap::new(),
            output_format: OutputFormat::Json,
            generated_by: "system".to_string(),
            signing_key: None,
            status_override: None,
        };

        let token = CancellationToken::new();
        token.cancel();

        let err = generator.generate(request, &token).await.unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
    }
}
