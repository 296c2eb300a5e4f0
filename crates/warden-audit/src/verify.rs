//! Chain verification, per spec §7's `AuditVerificationResult` contract and
//! §8 property 1/2 ("`verifyChain` returns `valid=true` and `entriesVerified =
//! count`"; mutating any field yields a failure pinpointing the sequence).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::compute_content_hash;
use crate::entry::AuditEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditVerificationResult {
    pub valid: bool,
    pub entries_verified: u64,
    pub first_invalid_entry: Option<u64>,
    pub invalid_reason: Option<String>,
    pub verified_at: DateTime<Utc>,
    pub last_entry_hash: Option<String>,
}

/// Verify that `entries` (assumed already sorted ascending by sequence) form
/// a valid chain: sequences are contiguous starting at the first entry's
/// sequence, `previousHash` links correctly, and every `contentHash`
/// recomputes.
pub fn verify_chain(entries: &[AuditEntry], now: DateTime<Utc>) -> AuditVerificationResult {
    let mut last_hash: Option<String> = None;
    let mut expected_sequence: Option<u64> = None;

    for entry in entries {
        if let Some(expected) = expected_sequence {
            if entry.chain.sequence != expected {
                return invalid(
                    entries,
                    entry.chain.sequence,
                    format!(
                        "sequence gap: expected {expected}, found {}",
                        entry.chain.sequence
                    ),
                    now,
                );
            }
        }

        if entry.chain.previous_hash != last_hash {
            return invalid(
                entries,
                entry.chain.sequence,
                format!(
                    "previousHash mismatch at sequence {}: expected {:?}, found {:?}",
                    entry.chain.sequence, last_hash, entry.chain.previous_hash
                ),
                now,
            );
        }

        let recomputed = compute_content_hash(entry, entry.chain.algorithm);
        if recomputed != entry.chain.content_hash {
            return invalid(
                entries,
                entry.chain.sequence,
                format!("contentHash mismatch at sequence {}", entry.chain.sequence),
                now,
            );
        }

        last_hash = Some(entry.chain.content_hash.clone());
        expected_sequence = Some(entry.chain.sequence + 1);
    }

    AuditVerificationResult {
        valid: true,
        entries_verified: entries.len() as u64,
        first_invalid_entry: None,
        invalid_reason: None,
        verified_at: now,
        last_entry_hash: last_hash,
    }
}

fn invalid(
    entries: &[AuditEntry],
    failing_sequence: u64,
    reason: String,
    now: DateTime<Utc>,
) -> AuditVerificationResult {
    let verified = entries
        .iter()
        .take_while(|e| e.chain.sequence != failing_sequence)
        .count() as u64;
    AuditVerificationResult {
        valid: false,
        entries_verified: verified,
        first_invalid_entry: Some(failing_sequence),
        invalid_reason: Some(reason),
        verified_at: now,
        last_entry_hash: entries.first().map(|e| e.chain.content_hash.clone()),
    }
}
