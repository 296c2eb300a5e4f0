//! Incident-to-regression generation, component **I**.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use serde::Serialize;

use crate::detector::source_from;
use crate::types::{ExpectedOutput, GoldenTask, Severity, Sla, Violation, ViolationStatus, ViolationType};

const DEFAULT_TARGET_HOURS: f64 = 48.0;

fn default_workflow(violation_type: ViolationType) -> &'static str {
    match violation_type {
        ViolationType::PolicyDenied => "policy-enforcement",
        ViolationType::ApprovalBypassed => "approval-gate",
        ViolationType::LimitExceeded => "rate-limiter",
        ViolationType::AnomalyDetected => "anomaly-detection",
    }
}

fn required_keywords(violation_type: ViolationType) -> Vec<String> {
    match violation_type {
        ViolationType::PolicyDenied => vec!["policy".to_string(), "deny".to_string()],
        ViolationType::ApprovalBypassed => vec!["approval".to_string(), "bypass".to_string()],
        ViolationType::LimitExceeded => vec!["limit".to_string(), "throttle".to_string()],
        ViolationType::AnomalyDetected => vec!["anomaly".to_string(), "confidence".to_string()],
    }
}

/// Maps violation types to the workflow a generated golden task exercises.
/// Defaults per spec §4.I; callers may override entries for their own
/// deployment's workflow naming.
#[derive(Debug, Clone)]
pub struct WorkflowMapping {
    overrides: std::collections::HashMap<ViolationType, String>,
}

impl Default for WorkflowMapping {
    fn default() -> Self {
        Self { overrides: std::collections::HashMap::new() }
    }
}

impl WorkflowMapping {
    pub fn with_override(mut self, violation_type: ViolationType, workflow: impl Into<String>) -> Self {
        self.overrides.insert(violation_type, workflow.into());
        self
    }

    fn resolve(&self, violation_type: ViolationType) -> String {
        self.overrides.get(&violation_type).cloned().unwrap_or_else(|| default_workflow(violation_type).to_string())
    }
}

type TaskGeneratedCallback = Box<dyn Fn(&GoldenTask) + Send + Sync>;

/// Generates one [`GoldenTask`] per resolved-or-dismissed violation whose
/// severity meets `minimum_severity`, deduplicated by violation id across
/// the generator's lifetime, per spec §4.I step 1.
pub struct IncidentGenerator {
    workflow_mapping: WorkflowMapping,
    target_hours: f64,
    minimum_severity: Severity,
    seen: Mutex<HashSet<uuid::Uuid>>,
    on_task_generated: Option<TaskGeneratedCallback>,
}

impl IncidentGenerator {
    pub fn new(workflow_mapping: WorkflowMapping) -> Self {
        Self {
            workflow_mapping,
            target_hours: DEFAULT_TARGET_HOURS,
            minimum_severity: Severity::Medium,
            seen: Mutex::new(HashSet::new()),
            on_task_generated: None,
        }
    }

    pub fn with_target_hours(mut self, hours: f64) -> Self {
        self.target_hours = hours;
        self
    }

    pub fn with_minimum_severity(mut self, severity: Severity) -> Self {
        self.minimum_severity = severity;
        self
    }

    pub fn on_task_generated(mut self, cb: impl Fn(&GoldenTask) + Send + Sync + 'static) -> Self {
        self.on_task_generated = Some(Box::new(cb));
        self
    }

    /// Generates a golden task for a resolved-or-dismissed violation at or
    /// above `minimum_severity`. Returns `None` if the violation doesn't
    /// qualify yet, or if a task was already generated for this violation id.
    pub fn generate(&self, violation: &Violation, resolved_at: DateTime<Utc>) -> Option<GoldenTask> {
        if !matches!(violation.status, ViolationStatus::Resolved | ViolationStatus::Dismissed) {
            return None;
        }
        if violation.severity < self.minimum_severity {
            return None;
        }

        {
            let mut seen = self.seen.lock();
            if !seen.insert(violation.id) {
                return None;
            }
        }

        let actual_hours = (resolved_at - violation.detected_at).num_seconds() as f64 / 3600.0;
        let sla = Sla { target_hours: self.target_hours, actual_hours, within_sla: actual_hours <= self.target_hours };

        let task = GoldenTask {
            id: format!("incident-{}", violation.id),
            workflow: self.workflow_mapping.resolve(violation.violation_type),
            source: source_from(violation),
            input: serde_json::json!({
                "actor": violation.actor,
                "action": violation.action,
                "resource": violation.resource,
                "summary": violation.summary,
            }),
            expected_output: ExpectedOutput {
                min_score: 80,
                required_keywords: required_keywords(violation.violation_type),
                required_actions: vec!["deny".to_string()],
            },
            sla,
            tags: vec!["incident-regression".to_string(), tag(violation.violation_type).to_string()],
        };

        if let Some(cb) = &self.on_task_generated {
            cb(&task);
        }

        Some(task)
    }

    /// Renders a task as YAML with the header comments the teacher's tooling
    /// expects on generated fixtures, wrapped in the top-level `tasks:` list
    /// golden task files use, per spec §6.
    pub fn to_yaml(task: &GoldenTask) -> Result<String, serde_yaml::Error> {
        let list = GoldenTaskList { tasks: vec![task.clone()] };
        let body = serde_yaml::to_string(&list)?;
        Ok(format!("# Auto-generated golden task\n# SLA: target {}h, actual {:.1}h, within_sla={}\n{body}", task.sla.target_hours, task.sla.actual_hours, task.sla.within_sla))
    }
}

#[derive(Debug, Clone, Serialize)]
struct GoldenTaskList {
    tasks: Vec<GoldenTask>,
}

fn tag(t: ViolationType) -> &'static str {
    match t {
        ViolationType::PolicyDenied => "policy-denied",
        ViolationType::ApprovalBypassed => "approval-bypassed",
        ViolationType::LimitExceeded => "limit-exceeded",
        ViolationType::AnomalyDetected => "anomaly-detected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ViolationDetails, ViolationMetadata, ViolationStatus};
    use chrono::TimeZone;
    use warden_audit::{Action, ActionCategory, Actor};

    fn sample() -> Violation {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Violation {
            id: uuid::Uuid::new_v4(),
            tenant_id: "t1".to_string(),
            violation_type: ViolationType::PolicyDenied,
            severity: crate::types::Severity::High,
            source: "policy-engine".to_string(),
            status: ViolationStatus::Resolved,
            actor: Actor::Agent { id: "agent-1".to_string(), on_behalf_of: None },
            resource: None,
            action: Action { category: ActionCategory::Push, action_type: "repo.push".to_string(), sensitive: false, description: None },
            summary: "push denied".to_string(),
            details: ViolationDetails::PolicyDenied { rule_id: "r1".to_string(), policy_id: "p1".to_string(), effect: "deny".to_string() },
            detected_at: now,
            metadata: ViolationMetadata { created_at: now, updated_at: now, updated_by: None, resolution_notes: None },
            fingerprint: "fp".to_string(),
        }
    }

    #[test]
    fn generating_twice_for_the_same_violation_is_deduplicated() {
        let generator = IncidentGenerator::new(WorkflowMapping::default());
        let violation = sample();
        let resolved_at = violation.detected_at + chrono::Duration::hours(2);

        assert!(generator.generate(&violation, resolved_at).is_some());
        assert!(generator.generate(&violation, resolved_at).is_none());
    }

    #[test]
    fn sla_breach_is_flagged_when_resolution_exceeds_target() {
        let generator = IncidentGenerator::new(WorkflowMapping::default()).with_target_hours(24.0);
        let violation = sample();
        let resolved_at = violation.detected_at + chrono::Duration::hours(30);

        let task = generator.generate(&violation, resolved_at).unwrap();
        assert!(!task.sla.within_sla);
    }

    #[test]
    fn yaml_includes_header_comments() {
        let generator = IncidentGenerator::new(WorkflowMapping::default());
        let violation = sample();
        let task = generator.generate(&violation, violation.detected_at + chrono::Duration::hours(1)).unwrap();

        let yaml = IncidentGenerator::to_yaml(&task).unwrap();
        assert!(yaml.starts_with("# Auto-generated golden task"));
        assert!(yaml.contains("workflow: policy-enforcement"));
    }

    #[test]
    fn yaml_wraps_task_in_top_level_tasks_list() {
        let generator = IncidentGenerator::new(WorkflowMapping::default());
        let violation = sample();
        let task = generator.generate(&violation, violation.detected_at + chrono::Duration::hours(1)).unwrap();

        let yaml = IncidentGenerator::to_yaml(&task).unwrap();
        assert!(yaml.contains("tasks:"));
        assert!(yaml.contains("- id:"));
    }

    #[test]
    fn unresolved_violation_does_not_generate_a_task() {
        let generator = IncidentGenerator::new(WorkflowMapping::default());
        let mut violation = sample();
        violation.status = ViolationStatus::Detected;

        assert!(generator.generate(&violation, violation.detected_at + chrono::Duration::hours(1)).is_none());
    }

    #[test]
    fn below_minimum_severity_does_not_generate_a_task() {
        let generator = IncidentGenerator::new(WorkflowMapping::default()).with_minimum_severity(Severity::Critical);
        let violation = sample();

        assert!(generator.generate(&violation, violation.detected_at + chrono::Duration::hours(1)).is_none());
    }
}
