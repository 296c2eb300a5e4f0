//! Chain builder — component **B**.
//!
//! Grounded on `packages/arbiter/src/audit.rs`'s `AuditLedger` (the
//! `Arc<RwLock<..>>` discipline and builder-style record construction) but
//! adapted to produce the hash-linked `AuditEntry` chain spec §4.B describes
//! rather than a flat ledger.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use warden_core::Clock;
use warden_hash::{digest, HashAlgorithm, PrivateKey};

use crate::entry::{AuditEntry, AuditEntryInput, ChainLink};

/// The fields excluded from an entry's content hash, per spec §4.A.
const EXCLUDED_PATHS: [&str; 4] = ["chain.contentHash", "chain.signature", "contextHash", "receivedAt"];

#[derive(Clone, Copy)]
struct ChainState {
    next_sequence: u64,
    last_hash: Option<String>,
}

/// Builds linked audit entries for a single logical writer.
///
/// State is `(nextSequence, lastHash, algorithm)`, initial `(0, None,
/// sha256)`. A builder is private to one log: spec §5 notes "the chain
/// builder's `(nextSequence, lastHash)` is private to its log".
pub struct ChainBuilder {
    state: Mutex<ChainState>,
    algorithm: HashAlgorithm,
    signing_key: Option<Arc<PrivateKey>>,
    clock: Arc<dyn Clock>,
}

impl ChainBuilder {
    pub fn new(algorithm: HashAlgorithm, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(ChainState {
                next_sequence: 0,
                last_hash: None,
            }),
            algorithm,
            signing_key: None,
            clock,
        }
    }

    pub fn with_signing_key(mut self, key: Arc<PrivateKey>) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Restore state after persistence (e.g. process restart), per spec §4.B
    /// `initializeFrom`.
    pub fn initialize_from(&self, sequence: u64, hash: Option<String>) {
        let mut state = self.state.lock();
        state.next_sequence = sequence;
        state.last_hash = hash;
    }

    /// Back to the initial `(0, None)` state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.next_sequence = 0;
        state.last_hash = None;
    }

    pub fn next_sequence(&self) -> u64 {
        self.state.lock().next_sequence
    }

    /// Build the next entry in this chain. Computing the content hash and
    /// advancing `(nextSequence, lastHash)` happen under the same lock, so
    /// the chain cannot fork under concurrent callers (spec §5: "`contentHash`
    /// is computed before the mutex is released").
    pub fn build_entry(&self, input: AuditEntryInput) -> AuditEntry {
        let mut state = self.state.lock();

        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let timestamp = input.timestamp.unwrap_or_else(|| self.clock.now());
        let sequence = state.next_sequence;
        let previous_hash = state.last_hash.clone();

        let mut entry = AuditEntry {
            id,
            schema_version: "1.0".to_string(),
            timestamp,
            actor: input.actor,
            action: input.action,
            resource: input.resource,
            outcome: input.outcome,
            context: input.context,
            chain: ChainLink {
                sequence,
                previous_hash: previous_hash.clone(),
                content_hash: String::new(),
                algorithm: self.algorithm,
                computed_at: self.clock.now(),
                signature: None,
            },
            context_hash: None,
            received_at: None,
            tags: input.tags,
            high_risk: input.high_risk,
            compliance: input.compliance,
            details: input.details,
        };

        let content_hash = compute_content_hash(&entry, self.algorithm);
        entry.chain.content_hash = content_hash.clone();

        if let Some(key) = &self.signing_key {
            if let Ok(sig) = key.sign(content_hash.as_bytes()) {
                entry.chain.signature = Some(sig);
            }
        }

        state.next_sequence += 1;
        state.last_hash = Some(content_hash);

        entry
    }
}

/// `contentHash = H(canonical(entry \ {chain.contentHash, chain.signature,
/// contextHash, receivedAt}))`. `chain.sequence`/`previousHash`/`algorithm`/
/// `computedAt` remain covered, so the hash is sensitive to an entry's
/// position and linkage, not only its payload.
pub fn compute_content_hash(entry: &AuditEntry, algorithm: HashAlgorithm) -> String {
    let value: Value = serde_json::to_value(entry).expect("AuditEntry always serialises");
    let stripped = warden_hash::without_paths(value, &EXCLUDED_PATHS);
    let bytes = warden_hash::canonical_bytes(&stripped);
    digest(&bytes, algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Action, ActionCategory, Actor, AuditContext, Outcome};
    use warden_core::SystemClock;

    fn sample_input() -> AuditEntryInput {
        AuditEntryInput::new(
            Actor::Agent { id: "agent-1".into(), on_behalf_of: None },
            Action {
                category: ActionCategory::Push,
                action_type: "repo.push".into(),
                sensitive: false,
                description: None,
            },
            Outcome::Success,
            AuditContext {
                tenant_id: "tenant-a".into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn s1_three_entries_chain_correctly() {
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let e0 = builder.build_entry(sample_input());
        let e1 = builder.build_entry(sample_input());
        let e2 = builder.build_entry(sample_input());

        assert_eq!(e0.chain.sequence, 0);
        assert!(e0.chain.previous_hash.is_none());
        assert_eq!(e1.chain.previous_hash.as_deref(), Some(e0.chain.content_hash.as_str()));
        assert_eq!(e2.chain.previous_hash.as_deref(), Some(e1.chain.content_hash.as_str()));
        assert_eq!(e0.chain.sequence + 1, e1.chain.sequence);
        assert_eq!(e1.chain.sequence + 1, e2.chain.sequence);
    }

    #[test]
    fn content_hash_excludes_chain_and_context_hash_and_received_at() {
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let mut entry = builder.build_entry(sample_input());
        let recomputed = compute_content_hash(&entry, HashAlgorithm::Sha256);
        assert_eq!(recomputed, entry.chain.content_hash);

        // Mutating receivedAt must not change the content hash.
        entry.received_at = Some(Utc::now());
        let recomputed2 = compute_content_hash(&entry, HashAlgorithm::Sha256);
        assert_eq!(recomputed2, entry.chain.content_hash);
    }

    #[test]
    fn initialize_from_resumes_chain_after_restart() {
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        let e0 = builder.build_entry(sample_input());
        let fresh = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        fresh.initialize_from(e0.chain.sequence + 1, Some(e0.chain.content_hash.clone()));
        let e1 = fresh.build_entry(sample_input());
        assert_eq!(e1.chain.sequence, 1);
        assert_eq!(e1.chain.previous_hash.as_deref(), Some(e0.chain.content_hash.as_str()));
    }

    #[test]
    fn reset_returns_to_genesis() {
        let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
        builder.build_entry(sample_input());
        builder.reset();
        assert_eq!(builder.next_sequence(), 0);
    }
}
