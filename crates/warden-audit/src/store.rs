//! Audit store — component **D**.
//!
//! The trait is the abstract contract spec §4.D describes ("multiple
//! backends possible"); [`InMemoryAuditStore`] is the always-available
//! backend spec §4.D requires for tests, grounded on
//! `packages/arbiter/src/audit.rs`'s `Arc<RwLock<VecDeque<..>>>` discipline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use warden_core::CancellationToken;

use crate::entry::AuditEntry;
use crate::error::AuditError;

/// Identifies one audit log: `(tenant, scope, scopeId)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    pub tenant_id: String,
    pub scope: String,
    pub scope_id: String,
}

impl LogKey {
    pub fn new(tenant_id: impl Into<String>, scope: impl Into<String>, scope_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            scope: scope.into(),
            scope_id: scope_id.into(),
        }
    }
}

/// Live metadata about one log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogMetadata {
    pub tenant_id: String,
    pub scope: String,
    pub scope_id: String,
    pub latest_sequence: Option<u64>,
    pub head_hash: Option<String>,
    pub entry_count: u64,
    pub sealed: bool,
    pub sealed_at: Option<DateTime<Utc>>,
    pub seal_reason: Option<String>,
}

/// Sort order for `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Filters accepted by `AuditStore::query`, per spec §4.D.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub category: Option<crate::entry::ActionCategory>,
    /// Free-form severity tag, read from `entry.details["severity"]` if
    /// present — `AuditEntry` carries no first-class severity field (that
    /// belongs to violations), so this matches the spec's literal filter
    /// list without inventing a field the data model doesn't have.
    pub severity: Option<String>,
    pub actor_id: Option<String>,
    pub event_type: Option<String>,
    pub time_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub sequence_range: Option<(u64, u64)>,
    pub high_risk_only: bool,
    pub tags: Vec<String>,
    pub text_substring: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub order: SortOrder,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Ascending
    }
}

impl QueryFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(category) = self.category {
            if entry.action.category != category {
                return false;
            }
        }
        if let Some(severity) = &self.severity {
            let matches_severity = entry
                .details
                .get("severity")
                .and_then(|v| v.as_str())
                .map(|s| s == severity)
                .unwrap_or(false);
            if !matches_severity {
                return false;
            }
        }
        if let Some(actor_id) = &self.actor_id {
            if entry.actor.id() != actor_id {
                return false;
            }
        }
        if let Some(event_type) = &self.event_type {
            if &entry.action.action_type != event_type {
                return false;
            }
        }
        if let Some((start, end)) = self.time_window {
            if entry.timestamp < start || entry.timestamp > end {
                return false;
            }
        }
        if let Some((start, end)) = self.sequence_range {
            if entry.chain.sequence < start || entry.chain.sequence > end {
                return false;
            }
        }
        if self.high_risk_only && !entry.high_risk {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| entry.tags.contains(t)) {
            return false;
        }
        if let Some(needle) = &self.text_substring {
            let haystack = serde_json::to_string(entry).unwrap_or_default();
            if !haystack.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Abstract audit store contract. Multiple backends may exist; readers are
/// unbounded, append is serialised per `(tenant, scope, scopeId)`.
///
/// `append` accepts a [`CancellationToken`] per spec §5: checked before any
/// side effect, so a cancellation observed before the entry is persisted
/// leaves no trace; once persisted, cancellation is ignored for that call.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, key: &LogKey, entry: AuditEntry, cancellation: &CancellationToken) -> Result<(), AuditError>;
    async fn get_by_sequence(&self, key: &LogKey, sequence: u64) -> Option<AuditEntry>;
    async fn get_by_id(&self, key: &LogKey, id: Uuid) -> Option<AuditEntry>;
    async fn get_range(&self, key: &LogKey, start: u64, end: u64) -> Vec<AuditEntry>;
    async fn get_latest(&self, key: &LogKey) -> Option<AuditEntry>;
    async fn get_count(&self, key: &LogKey) -> u64;
    async fn query(&self, key: &LogKey, filter: &QueryFilter) -> Vec<AuditEntry>;
    async fn seal(&self, key: &LogKey, reason: String, now: DateTime<Utc>) -> Result<(), AuditError>;
    async fn metadata(&self, key: &LogKey) -> Option<AuditLogMetadata>;
}

#[derive(Default)]
struct LogState {
    entries: Vec<AuditEntry>,
    sealed: bool,
    sealed_at: Option<DateTime<Utc>>,
    seal_reason: Option<String>,
}

/// The always-available in-memory backend, suitable for tests and for small
/// single-node deployments.
#[derive(Default, Clone)]
pub struct InMemoryAuditStore {
    logs: Arc<RwLock<HashMap<LogKey, LogState>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, key: &LogKey, entry: AuditEntry, cancellation: &CancellationToken) -> Result<(), AuditError> {
        if cancellation.is_cancelled() {
            return Err(AuditError::Cancelled);
        }

        let mut logs = self.logs.write().await;
        let state = logs.entry(key.clone()).or_default();

        if state.sealed {
            return Err(AuditError::LogSealed(key.scope_id.clone()));
        }

        let expected_sequence = state.entries.last().map(|e| e.chain.sequence + 1).unwrap_or(0);
        if entry.chain.sequence != expected_sequence {
            return Err(AuditError::SequenceGap {
                expected: expected_sequence,
                actual: entry.chain.sequence,
            });
        }

        let expected_prev = state.entries.last().map(|e| e.chain.content_hash.clone());
        if entry.chain.previous_hash != expected_prev {
            return Err(AuditError::ChainMismatch {
                sequence: entry.chain.sequence,
                expected: expected_prev,
                actual: entry.chain.previous_hash.clone(),
            });
        }

        state.entries.push(entry);
        Ok(())
    }

    async fn get_by_sequence(&self, key: &LogKey, sequence: u64) -> Option<AuditEntry> {
        let logs = self.logs.read().await;
        logs.get(key)?.entries.iter().find(|e| e.chain.sequence == sequence).cloned()
    }

    async fn get_by_id(&self, key: &LogKey, id: Uuid) -> Option<AuditEntry> {
        let logs = self.logs.read().await;
        logs.get(key)?.entries.iter().find(|e| e.id == id).cloned()
    }

    async fn get_range(&self, key: &LogKey, start: u64, end: u64) -> Vec<AuditEntry> {
        let logs = self.logs.read().await;
        match logs.get(key) {
            Some(state) => state
                .entries
                .iter()
                .filter(|e| e.chain.sequence >= start && e.chain.sequence <= end)
                .cloned()
                .collect(),
            None => vec![],
        }
    }

    async fn get_latest(&self, key: &LogKey) -> Option<AuditEntry> {
        let logs = self.logs.read().await;
        logs.get(key)?.entries.last().cloned()
    }

    async fn get_count(&self, key: &LogKey) -> u64 {
        let logs = self.logs.read().await;
        logs.get(key).map(|s| s.entries.len() as u64).unwrap_or(0)
    }

    async fn query(&self, key: &LogKey, filter: &QueryFilter) -> Vec<AuditEntry> {
        let logs = self.logs.read().await;
        let Some(state) = logs.get(key) else { return vec![] };

        let mut matched: Vec<AuditEntry> = state.entries.iter().filter(|e| filter.matches(e)).cloned().collect();
        if filter.order == SortOrder::Descending {
            matched.reverse();
        }
        let start = filter.offset.min(matched.len());
        match filter.limit {
            Some(limit) => matched[start..].iter().take(limit).cloned().collect(),
            None => matched[start..].to_vec(),
        }
    }

    async fn seal(&self, key: &LogKey, reason: String, now: DateTime<Utc>) -> Result<(), AuditError> {
        let mut logs = self.logs.write().await;
        let state = logs.entry(key.clone()).or_default();
        state.sealed = true;
        state.sealed_at = Some(now);
        state.seal_reason = Some(reason);
        Ok(())
    }

    async fn metadata(&self, key: &LogKey) -> Option<AuditLogMetadata> {
        let logs = self.logs.read().await;
        let state = logs.get(key)?;
        Some(AuditLogMetadata {
            tenant_id: key.tenant_id.clone(),
            scope: key.scope.clone(),
            scope_id: key.scope_id.clone(),
            latest_sequence: state.entries.last().map(|e| e.chain.sequence),
            head_hash: state.entries.last().map(|e| e.chain.content_hash.clone()),
            entry_count: state.entries.len() as u64,
            sealed: state.sealed,
            sealed_at: state.sealed_at,
            seal_reason: state.seal_reason.clone(),
        })
    }
}

impl PartialEq for SortOrder {
    fn eq(&self, other: &Self) -> bool {
        matches!((self, other), (Self::Ascending, Self::Ascending) | (Self::Descending, Self::Descending))
    }
}
impl Eq for SortOrder {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainBuilder;
    use crate::entry::{Action, ActionCategory, Actor, AuditContext, AuditEntryInput, Outcome};
    use warden_core::SystemClock;
    use warden_hash::HashAlgorithm;

    fn key() -> LogKey {
        LogKey::new("tenant-a", "repo", "repo-1")
    }

    fn input() -> AuditEntryInput {
        AuditEntryInput::new(
            Actor::Agent { id: "agent-1".into(), on_behalf_of: None },
            Action {
                category: ActionCategory::Push,
                action_type: "repo.push".into(),
                sensitive: false,
                description: None,
            },
            Outcome::Success,
            AuditContext { tenant_id: "tenant-a".into(), ..Default::default() },
        )
    }

    #[tokio::test]
    async fn append_and_fetch_roundtrip() {
        let store = InMemoryAuditStore::new();
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let entry = builder.build_entry(input());
        let id = entry.id;
        store.append(&key(), entry, &CancellationToken::none()).await.unwrap();

        assert_eq!(store.get_count(&key()).await, 1);
        assert!(store.get_by_id(&key(), id).await.is_some());
        assert!(store.get_by_sequence(&key(), 0).await.is_some());
    }

    #[tokio::test]
    async fn sequence_gap_rejected() {
        let store = InMemoryAuditStore::new();
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let mut entry = builder.build_entry(input());
        entry.chain.sequence = 5;
        let err = store.append(&key(), entry, &CancellationToken::none()).await.unwrap_err();
        assert_eq!(err.code(), "ERR_SEQUENCE_GAP");
    }

    #[tokio::test]
    async fn sealed_log_rejects_append() {
        let store = InMemoryAuditStore::new();
        store.seal(&key(), "investigation".into(), Utc::now()).await.unwrap();
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let entry = builder.build_entry(input());
        let err = store.append(&key(), entry, &CancellationToken::none()).await.unwrap_err();
        assert_eq!(err.code(), "ERR_LOG_SEALED");
    }

    #[tokio::test]
    async fn query_filters_by_high_risk() {
        let store = InMemoryAuditStore::new();
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let mut risky = input();
        risky.high_risk = true;
        store.append(&key(), builder.build_entry(risky), &CancellationToken::none()).await.unwrap();
        store.append(&key(), builder.build_entry(input()), &CancellationToken::none()).await.unwrap();

        let filter = QueryFilter {
            high_risk_only: true,
            ..Default::default()
        };
        let results = store.query(&key(), &filter).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].high_risk);
    }

    #[tokio::test]
    async fn cancelled_token_rejects_append_before_any_side_effect() {
        let store = InMemoryAuditStore::new();
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let entry = builder.build_entry(input());
        let token = CancellationToken::new();
        token.cancel();

        let err = store.append(&key(), entry, &token).await.unwrap_err();
        assert_eq!(err.code(), "ERR_CANCELLED");
        assert_eq!(store.get_count(&key()).await, 0);
    }
}
