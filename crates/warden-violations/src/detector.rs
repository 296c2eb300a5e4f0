//! Violation detection pipeline, component **G**.
//!
//! Grounded on `packages/arbiter/src/escalation/triggers.rs`'s trigger
//! evaluation loop, adapted to dedup-then-persist-then-notify semantics.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;
use warden_audit::{Action, Actor, Resource};
use warden_core::{CancellationToken, Clock};

use crate::error::ViolationError;
use crate::fingerprint;
use crate::store::{AggregateOptions, GroupBy, ViolationStore};
use crate::types::{
    GoldenTaskSource, Pattern, Severity, Violation, ViolationDetails, ViolationMetadata, ViolationStatus,
    ViolationType,
};

/// Tunables for one tenant's detection pipeline, per spec §4.G.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub min_violation_interval_ms: u64,
    pub aggregation_window_ms: u64,
    pub pattern_threshold: u64,
    pub auto_escalate_critical: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_violation_interval_ms: 60_000,
            aggregation_window_ms: 60_000,
            pattern_threshold: 3,
            auto_escalate_critical: true,
        }
    }
}

/// Input describing one candidate violation, prior to dedup/severity scoring.
pub struct DetectionInput {
    pub tenant_id: String,
    pub actor: Actor,
    pub resource: Option<Resource>,
    pub action: Action,
    pub summary: String,
    pub details: ViolationDetails,
    pub source: String,
}

/// Outcome of a single `detect` call, per spec §8 scenario S4's
/// `{created, deduplicated}` shape.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub violation: Violation,
    pub created: bool,
    pub deduplicated: bool,
}

/// Default severity per source, per spec §4.G step 2.
fn default_severity(details: &ViolationDetails) -> Severity {
    match details {
        ViolationDetails::PolicyDenied { .. } => Severity::High,
        ViolationDetails::ApprovalBypassed { .. } => Severity::Critical,
        ViolationDetails::LimitExceeded { limit, actual, .. } => {
            if *limit > 0.0 && *actual >= limit * 2.0 {
                Severity::High
            } else {
                Severity::Medium
            }
        }
        ViolationDetails::AnomalyDetected { confidence, score, .. } => {
            let scaled = confidence * score / 100.0;
            if scaled >= 0.75 {
                Severity::Critical
            } else if scaled >= 0.4 {
                Severity::High
            } else if scaled >= 0.15 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
    }
}

type PatternCallback = Box<dyn Fn(Pattern, ViolationType) + Send + Sync>;
type ViolationCallback = Box<dyn Fn(&Violation) + Send + Sync>;

struct AggregationBucket {
    window_start: DateTime<Utc>,
    count: u64,
    fired: bool,
}

/// Deduplicates, scores, persists, and aggregates incoming violation candidates.
pub struct ViolationDetector<S: ViolationStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: DetectorConfig,
    buckets: Mutex<HashMap<(String, String, String), AggregationBucket>>,
    on_violation_detected: Option<ViolationCallback>,
    on_pattern_detected: Option<PatternCallback>,
}

impl<S: ViolationStore> ViolationDetector<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: DetectorConfig) -> Self {
        Self {
            store,
            clock,
            config,
            buckets: Mutex::new(HashMap::new()),
            on_violation_detected: None,
            on_pattern_detected: None,
        }
    }

    pub fn on_violation_detected(mut self, cb: impl Fn(&Violation) + Send + Sync + 'static) -> Self {
        self.on_violation_detected = Some(Box::new(cb));
        self
    }

    pub fn on_pattern_detected(mut self, cb: impl Fn(Pattern, ViolationType) + Send + Sync + 'static) -> Self {
        self.on_pattern_detected = Some(Box::new(cb));
        self
    }

    /// Detects, dedups, and persists a candidate violation. Accepts a
    /// [`CancellationToken`], checked before any side effect is made
    /// observable (the store write), per spec §5.
    pub async fn detect(
        &self,
        input: DetectionInput,
        rule_or_signal_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<DetectionOutcome, ViolationError> {
        if cancellation.is_cancelled() {
            return Err(ViolationError::Cancelled);
        }

        let now = self.clock.now();
        let violation_type = input.details.violation_type();
        let resource_id = input.resource.as_ref().map(|r| r.id.as_str()).unwrap_or("");

        let fp = fingerprint::compute(
            &input.tenant_id,
            tag(violation_type),
            input.actor.id(),
            resource_id,
            &input.action.action_type,
            rule_or_signal_id,
            now,
            self.config.min_violation_interval_ms,
        );

        if let Some(existing) = self.store.find_by_fingerprint(&input.tenant_id, &fp).await {
            return Ok(DetectionOutcome { violation: existing, created: false, deduplicated: true });
        }

        if cancellation.is_cancelled() {
            return Err(ViolationError::Cancelled);
        }

        let severity = default_severity(&input.details);
        let status = if severity == Severity::Critical && self.config.auto_escalate_critical {
            ViolationStatus::Escalated
        } else {
            ViolationStatus::Detected
        };

        let violation = Violation {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id.clone(),
            violation_type,
            severity,
            source: input.source,
            status,
            actor: input.actor,
            resource: input.resource,
            action: input.action,
            summary: input.summary,
            details: input.details,
            detected_at: now,
            metadata: ViolationMetadata { created_at: now, updated_at: now, updated_by: None, resolution_notes: None },
            fingerprint: fp,
        };

        let stored = self.store.create(violation).await;

        if let Some(cb) = &self.on_violation_detected {
            cb(&stored);
        }

        self.record_for_pattern_detection(&stored, now).await;

        Ok(DetectionOutcome { violation: stored, created: true, deduplicated: false })
    }

    async fn record_for_pattern_detection(&self, violation: &Violation, now: DateTime<Utc>) {
        let key = (
            violation.tenant_id.clone(),
            violation.actor.id().to_string(),
            violation.resource.as_ref().map(|r| r.id.clone()).unwrap_or_default(),
        );

        let should_fire = {
            let mut buckets = self.buckets.lock();
            let window_ms = self.config.aggregation_window_ms;
            let bucket = buckets.entry(key).or_insert_with(|| AggregationBucket { window_start: now, count: 0, fired: false });
            if (now - bucket.window_start).num_milliseconds() as u64 > window_ms {
                bucket.window_start = now;
                bucket.count = 0;
                bucket.fired = false;
            }
            bucket.count += 1;
            // Fire only on the edge transition into threshold, once per window.
            if bucket.count >= self.config.pattern_threshold && !bucket.fired {
                bucket.fired = true;
                true
            } else {
                false
            }
        };

        if should_fire {
            if let Some(cb) = &self.on_pattern_detected {
                let options = AggregateOptions {
                    group_by: GroupBy::Actor,
                    start_time: now - chrono::Duration::milliseconds(self.config.aggregation_window_ms as i64),
                    end_time: now,
                    min_count: self.config.pattern_threshold,
                };
                let patterns = self.store.aggregate(&violation.tenant_id, &options).await;
                if let Some(pattern) = patterns.into_iter().find(|p| p.group_key == violation.actor.id()) {
                    cb(pattern, violation.violation_type);
                }
            }
        }
    }
}

fn tag(t: ViolationType) -> &'static str {
    match t {
        ViolationType::PolicyDenied => "policy-denied",
        ViolationType::ApprovalBypassed => "approval-bypassed",
        ViolationType::LimitExceeded => "limit-exceeded",
        ViolationType::AnomalyDetected => "anomaly-detected",
    }
}

/// Derives a [`GoldenTaskSource`] stub for the incident generator, kept here
/// since it only needs a violation, not the store.
pub fn source_from(violation: &Violation) -> GoldenTaskSource {
    GoldenTaskSource { violation_id: violation.id, violation_type: violation.violation_type, severity: violation.severity }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryViolationStore;
    use warden_audit::ActionCategory;
    use warden_core::FrozenClock;

    fn input(actor_id: &str) -> DetectionInput {
        DetectionInput {
            tenant_id: "t1".to_string(),
            actor: Actor::Agent { id: actor_id.to_string(), on_behalf_of: None },
            resource: Some(Resource { resource_type: "repo".to_string(), id: "repo-1".to_string(), name: None }),
            action: Action { category: ActionCategory::Push, action_type: "repo.push".to_string(), sensitive: false, description: None },
            summary: "push denied by policy".to_string(),
            details: ViolationDetails::PolicyDenied {
                rule_id: "rule-1".to_string(),
                policy_id: "policy-1".to_string(),
                effect: "deny".to_string(),
            },
            source: "policy-engine".to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_detection_in_window_dedupes() {
        let store = Arc::new(InMemoryViolationStore::new());
        let clock = FrozenClock::at(Utc::now());
        let detector = ViolationDetector::new(store, clock, DetectorConfig::default());

        let first = detector.detect(input("agent-1"), "rule-1", &CancellationToken::none()).await.unwrap();
        assert!(first.created);
        assert!(!first.deduplicated);

        let second = detector.detect(input("agent-1"), "rule-1", &CancellationToken::none()).await.unwrap();
        assert!(!second.created);
        assert!(second.deduplicated);
    }

    #[tokio::test]
    async fn approval_bypassed_is_always_critical_and_escalated() {
        let store = Arc::new(InMemoryViolationStore::new());
        let clock = FrozenClock::at(Utc::now());
        let detector = ViolationDetector::new(store, clock, DetectorConfig::default());

        let mut candidate = input("agent-1");
        candidate.details = ViolationDetails::ApprovalBypassed { required_approvers: 2, actual_approvers: 0 };

        let outcome = detector.detect(candidate, "approval-flow", &CancellationToken::none()).await.unwrap();
        assert_eq!(outcome.violation.severity, Severity::Critical);
        assert_eq!(outcome.violation.status, ViolationStatus::Escalated);
    }

    #[tokio::test]
    async fn four_denials_above_threshold_trigger_pattern_callback() {
        let store = Arc::new(InMemoryViolationStore::new());
        let clock = FrozenClock::at(Utc::now());
        let triggered = Arc::new(Mutex::new(0u32));
        let triggered_clone = triggered.clone();

        let detector = ViolationDetector::new(store, clock, DetectorConfig { pattern_threshold: 3, ..DetectorConfig::default() })
            .on_pattern_detected(move |pattern, _| {
                assert!(pattern.count >= 3);
                *triggered_clone.lock() += 1;
            });

        for i in 0..4 {
            let mut candidate = input("agent-1");
            candidate.details = ViolationDetails::PolicyDenied {
                rule_id: format!("rule-{i}"),
                policy_id: "policy-1".to_string(),
                effect: "deny".to_string(),
            };
            detector.detect(candidate, &format!("rule-{i}"), &CancellationToken::none()).await.unwrap();
        }

        assert_eq!(*triggered.lock(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_rejects_detect_before_any_side_effect() {
        let store = Arc::new(InMemoryViolationStore::new());
        let clock = FrozenClock::at(Utc::now());
        let detector = ViolationDetector::new(store.clone(), clock, DetectorConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        let err = detector.detect(input("agent-1"), "rule-1", &token).await.unwrap_err();
        assert_eq!(err.code(), "ERR_CANCELLED");
        assert_eq!(store.count(&crate::store::QueryFilter::default()).await, 0);
    }
}
