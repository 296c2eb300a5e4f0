//! Violation store — component **G**'s persistence contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ViolationError;
use crate::types::{Pattern, Severity, Violation, ViolationStatus, ViolationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Severity,
    Time,
    Count,
}

#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub tenant_id: Option<String>,
    pub violation_type: Option<ViolationType>,
    pub severity: Option<Severity>,
    pub actor_id: Option<String>,
    pub resource_id: Option<String>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub status: Option<ViolationStatus>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub sort_by: Option<SortBy>,
}

impl QueryFilter {
    fn matches(&self, v: &Violation) -> bool {
        if let Some(t) = &self.tenant_id {
            if &v.tenant_id != t {
                return false;
            }
        }
        if let Some(vt) = self.violation_type {
            if v.violation_type != vt {
                return false;
            }
        }
        if let Some(s) = self.severity {
            if v.severity != s {
                return false;
            }
        }
        if let Some(actor) = &self.actor_id {
            if v.actor.id() != actor {
                return false;
            }
        }
        if let Some(resource) = &self.resource_id {
            if v.resource.as_ref().map(|r| &r.id) != Some(resource) {
                return false;
            }
        }
        if let Some((start, end)) = self.time_range {
            if v.detected_at < start || v.detected_at > end {
                return false;
            }
        }
        if let Some(status) = self.status {
            if v.status != status {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Type,
    Actor,
    Resource,
    Severity,
}

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub group_by: GroupBy,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RecentOptions {
    pub violation_type: Option<ViolationType>,
    pub actor_id: Option<String>,
    pub window_ms: u64,
}

#[async_trait]
pub trait ViolationStore: Send + Sync {
    async fn create(&self, violation: Violation) -> Violation;
    async fn get(&self, id: Uuid) -> Result<Violation, ViolationError>;
    async fn find_by_fingerprint(&self, tenant_id: &str, fingerprint: &str) -> Option<Violation>;
    async fn update_status(
        &self,
        id: Uuid,
        status: ViolationStatus,
        updated_by: Option<String>,
        resolution_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Violation, ViolationError>;
    async fn query(&self, filter: &QueryFilter) -> Vec<Violation>;
    async fn aggregate(&self, tenant_id: &str, options: &AggregateOptions) -> Vec<Pattern>;
    async fn get_recent(&self, tenant_id: &str, options: &RecentOptions, now: DateTime<Utc>) -> Vec<Violation>;
    async fn count(&self, filter: &QueryFilter) -> u64;
    async fn clear(&self, tenant_id: Option<&str>);
}

#[derive(Default)]
pub struct InMemoryViolationStore {
    violations: RwLock<HashMap<Uuid, Violation>>,
}

impl InMemoryViolationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ViolationStore for InMemoryViolationStore {
    async fn create(&self, violation: Violation) -> Violation {
        let mut store = self.violations.write().await;
        store.insert(violation.id, violation.clone());
        violation
    }

    async fn get(&self, id: Uuid) -> Result<Violation, ViolationError> {
        let store = self.violations.read().await;
        store.get(&id).cloned().ok_or(ViolationError::NotFound(id))
    }

    async fn find_by_fingerprint(&self, tenant_id: &str, fingerprint: &str) -> Option<Violation> {
        let store = self.violations.read().await;
        store
            .values()
            .filter(|v| v.tenant_id == tenant_id && v.fingerprint == fingerprint && v.status != ViolationStatus::Dismissed)
            .max_by_key(|v| v.detected_at)
            .cloned()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ViolationStatus,
        updated_by: Option<String>,
        resolution_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Violation, ViolationError> {
        let mut store = self.violations.write().await;
        let violation = store.get_mut(&id).ok_or(ViolationError::NotFound(id))?;
        violation.status = status;
        violation.metadata.updated_at = now;
        violation.metadata.updated_by = updated_by;
        if resolution_notes.is_some() {
            violation.metadata.resolution_notes = resolution_notes;
        }
        Ok(violation.clone())
    }

    async fn query(&self, filter: &QueryFilter) -> Vec<Violation> {
        let store = self.violations.read().await;
        let mut matched: Vec<Violation> = store.values().filter(|v| filter.matches(v)).cloned().collect();

        match filter.sort_by {
            Some(SortBy::Severity) => matched.sort_by(|a, b| b.severity.cmp(&a.severity)),
            Some(SortBy::Time) | None => matched.sort_by_key(|v| v.detected_at),
            Some(SortBy::Count) => {}
        }

        let start = filter.offset.min(matched.len());
        match filter.limit {
            Some(limit) => matched[start..].iter().take(limit).cloned().collect(),
            None => matched[start..].to_vec(),
        }
    }

    async fn aggregate(&self, tenant_id: &str, options: &AggregateOptions) -> Vec<Pattern> {
        let store = self.violations.read().await;
        let mut buckets: HashMap<String, Vec<&Violation>> = HashMap::new();

        for v in store.values() {
            if v.tenant_id != tenant_id {
                continue;
            }
            if v.detected_at < options.start_time || v.detected_at > options.end_time {
                continue;
            }
            let key = match options.group_by {
                GroupBy::Type => format!("{:?}", v.violation_type),
                GroupBy::Actor => v.actor.id().to_string(),
                GroupBy::Resource => v.resource.as_ref().map(|r| r.id.clone()).unwrap_or_default(),
                GroupBy::Severity => format!("{:?}", v.severity),
            };
            buckets.entry(key).or_default().push(v);
        }

        buckets
            .into_iter()
            .filter(|(_, items)| items.len() as u64 >= options.min_count)
            .map(|(group_key, items)| {
                let unique_actors: std::collections::HashSet<&str> = items.iter().map(|v| v.actor.id()).collect();
                let unique_resources: std::collections::HashSet<String> =
                    items.iter().filter_map(|v| v.resource.as_ref().map(|r| r.id.clone())).collect();
                let first_seen = items.iter().map(|v| v.detected_at).min().unwrap();
                let last_seen = items.iter().map(|v| v.detected_at).max().unwrap();
                Pattern {
                    group_key,
                    count: items.len() as u64,
                    unique_actors: unique_actors.len() as u64,
                    unique_resources: unique_resources.len() as u64,
                    first_seen,
                    last_seen,
                }
            })
            .collect()
    }

    async fn get_recent(&self, tenant_id: &str, options: &RecentOptions, now: DateTime<Utc>) -> Vec<Violation> {
        let store = self.violations.read().await;
        let window_start = now - chrono::Duration::milliseconds(options.window_ms as i64);
        store
            .values()
            .filter(|v| v.tenant_id == tenant_id)
            .filter(|v| v.detected_at >= window_start)
            .filter(|v| options.violation_type.map(|t| t == v.violation_type).unwrap_or(true))
            .filter(|v| options.actor_id.as_deref().map(|a| a == v.actor.id()).unwrap_or(true))
            .cloned()
            .collect()
    }

    async fn count(&self, filter: &QueryFilter) -> u64 {
        let store = self.violations.read().await;
        store.values().filter(|v| filter.matches(v)).count() as u64
    }

    async fn clear(&self, tenant_id: Option<&str>) {
        let mut store = self.violations.write().await;
        match tenant_id {
            Some(t) => store.retain(|_, v| v.tenant_id != t),
            None => store.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ViolationDetails, ViolationMetadata};
    use chrono::TimeZone;
    use warden_audit::{Action, ActionCategory};

    fn sample(tenant_id: &str, actor_id: &str, now: DateTime<Utc>) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            violation_type: ViolationType::PolicyDenied,
            severity: Severity::High,
            source: "policy-engine".to_string(),
            status: ViolationStatus::Detected,
            actor: Actor::Agent { id: actor_id.to_string(), on_behalf_of: None },
            resource: Some(warden_audit::Resource {
                resource_type: "repo".to_string(),
                id: "repo-1".to_string(),
                name: None,
            }),
            action: Action {
                category: ActionCategory::Push,
                action_type: "repo.push".to_string(),
                sensitive: false,
                description: None,
            },
            summary: "push denied".to_string(),
            details: ViolationDetails::PolicyDenied {
                rule_id: "rule-1".to_string(),
                policy_id: "policy-1".to_string(),
                effect: "deny".to_string(),
            },
            detected_at: now,
            metadata: ViolationMetadata { created_at: now, updated_at: now, updated_by: None, resolution_notes: None },
            fingerprint: "fp-1".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let store = InMemoryViolationStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let v = sample("t1", "agent-1", now);
        let id = v.id;
        store.create(v).await;
        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.tenant_id, "t1");
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let store = InMemoryViolationStore::new();
        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "ERR_VIOLATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn update_status_sets_resolution_notes() {
        let store = InMemoryViolationStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let v = sample("t1", "agent-1", now);
        let id = v.id;
        store.create(v).await;
        let later = now + chrono::Duration::hours(1);
        let updated = store
            .update_status(id, ViolationStatus::Resolved, Some("reviewer-1".to_string()), Some("fixed".to_string()), later)
            .await
            .unwrap();
        assert_eq!(updated.status, ViolationStatus::Resolved);
        assert_eq!(updated.metadata.resolution_notes.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn aggregate_groups_by_actor_above_min_count() {
        let store = InMemoryViolationStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        for i in 0..4 {
            let mut v = sample("t1", "agent-1", now + chrono::Duration::seconds(i));
            v.id = Uuid::new_v4();
            store.create(v).await;
        }
        store.create(sample("t1", "agent-2", now)).await;

        let patterns = store
            .aggregate(
                "t1",
                &AggregateOptions {
                    group_by: GroupBy::Actor,
                    start_time: now - chrono::Duration::minutes(1),
                    end_time: now + chrono::Duration::minutes(1),
                    min_count: 3,
                },
            )
            .await;

        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].group_key, "agent-1");
        assert_eq!(patterns[0].count, 4);
    }

    #[tokio::test]
    async fn query_sorts_by_severity_descending() {
        let store = InMemoryViolationStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut low = sample("t1", "agent-1", now);
        low.severity = Severity::Low;
        let mut critical = sample("t1", "agent-1", now);
        critical.severity = Severity::Critical;
        store.create(low).await;
        store.create(critical).await;

        let results = store
            .query(&QueryFilter { tenant_id: Some("t1".to_string()), sort_by: Some(SortBy::Severity), ..Default::default() })
            .await;

        assert_eq!(results[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn find_by_fingerprint_ignores_dismissed() {
        let store = InMemoryViolationStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut v = sample("t1", "agent-1", now);
        v.fingerprint = "fp-shared".to_string();
        v.status = ViolationStatus::Dismissed;
        store.create(v).await;

        assert!(store.find_by_fingerprint("t1", "fp-shared").await.is_none());
    }
}
