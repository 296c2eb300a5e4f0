//! Stable violation fingerprinting, per spec §4.G step 1.

use chrono::{DateTime, Utc};
use warden_hash::{digest, HashAlgorithm};

/// `H(tenantId | type | actor.id | resource.id | action.type | ruleOrSignalId | floor(now/windowMs))`.
pub fn compute(
    tenant_id: &str,
    violation_type: &str,
    actor_id: &str,
    resource_id: &str,
    action_type: &str,
    rule_or_signal_id: &str,
    now: DateTime<Utc>,
    window_ms: u64,
) -> String {
    let bucket = now.timestamp_millis() / window_ms.max(1) as i64;
    let joined = format!("{tenant_id}|{violation_type}|{actor_id}|{resource_id}|{action_type}|{rule_or_signal_id}|{bucket}");
    digest(joined.as_bytes(), HashAlgorithm::Sha256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identical_inputs_in_the_same_window_collide() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let a = compute("t1", "policy-denied", "agent-1", "repo-1", "repo.push", "rule-1", now, 60_000);
        let b = compute("t1", "policy-denied", "agent-1", "repo-1", "repo.push", "rule-1", now, 60_000);
        assert_eq!(a, b);
    }

    #[test]
    fn different_windows_do_not_collide() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = now + chrono::Duration::milliseconds(120_000);
        let a = compute("t1", "policy-denied", "agent-1", "repo-1", "repo.push", "rule-1", now, 60_000);
        let b = compute("t1", "policy-denied", "agent-1", "repo-1", "repo.push", "rule-1", later, 60_000);
        assert_ne!(a, b);
    }
}
