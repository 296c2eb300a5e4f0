//! Policy engine — component **F**: inheritance resolution, rule ordering,
//! condition evaluation, and the risk-tier overlay.
//!
//! Grounded on `packages/pillars/gate/src/engine.rs`'s `GateEngine::verify`
//! (sort policies by priority, evaluate in order, synthesise a result) but
//! generalised to the typed rule model and multi-effect semantics this
//! spec requires.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;

use crate::condition::evaluate as evaluate_condition;
use crate::error::PolicyError;
use crate::types::{
    Effect, EvaluationMetadata, Inheritance, OperationClassification, PolicyDocument,
    PolicyEvaluationRequest, PolicyEvaluationResult, PolicyRule, RiskTierPolicy,
};

/// A policy plus its already-resolved parent, if any — the caller is
/// responsible for supplying the chain (spec §5: "policy documents are
/// immutable snapshots").
pub struct ResolvedPolicySet<'a> {
    pub policy: &'a PolicyDocument,
    pub parent: Option<&'a PolicyDocument>,
}

/// Flatten `policy`/`parent` into one ordered rule list per spec §4.F step 2.
pub fn resolve_rules<'a>(set: &ResolvedPolicySet<'a>) -> Result<Vec<&'a PolicyRule>, PolicyError> {
    let mut rules: Vec<&PolicyRule> = match (set.policy.inheritance, set.parent) {
        (Inheritance::Override, _) | (_, None) => set.policy.rules.iter().collect(),
        (Inheritance::Extend, Some(parent)) => {
            let mut combined: Vec<&PolicyRule> = parent.rules.iter().collect();
            combined.extend(set.policy.rules.iter());
            combined
        }
        (Inheritance::Strict, Some(parent)) => {
            let mut seen = HashSet::new();
            for rule in &parent.rules {
                seen.insert(rule.id.as_str());
            }
            for rule in &set.policy.rules {
                if !seen.insert(rule.id.as_str()) {
                    return Err(PolicyError::EvaluationFailed {
                        rule_id: rule.id.clone(),
                        message: format!("rule id '{}' collides with parent under strict inheritance", rule.id),
                    });
                }
            }
            let mut combined: Vec<&PolicyRule> = parent.rules.iter().collect();
            combined.extend(set.policy.rules.iter());
            combined
        }
    };

    rules.retain(|r| r.enabled);
    // Stable sort: descending priority, ties broken by original (declaration) order.
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(rules)
}

/// Evaluate `request` against the resolved rule set, producing the first
/// deciding effect plus any accumulated side-effect actions.
pub fn evaluate(
    request: &PolicyEvaluationRequest,
    set: &ResolvedPolicySet<'_>,
) -> Result<PolicyEvaluationResult, PolicyError> {
    let started = Instant::now();
    let rules = resolve_rules(set)?;

    let mut rules_evaluated = 0u32;
    let policies_evaluated = if set.parent.is_some() { 2 } else { 1 };
    let mut required_actions = Vec::new();
    let mut decided: Option<&PolicyRule> = None;

    for rule in &rules {
        rules_evaluated += 1;

        let matched = match rule.combinator {
            crate::types::Combinator::And => rule.conditions.iter().all(|c| eval_safe(c, request, &rule.id))?,
            crate::types::Combinator::Or => {
                if rule.conditions.is_empty() {
                    true
                } else {
                    let mut any = false;
                    for c in &rule.conditions {
                        if eval_safe(c, request, &rule.id)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
            }
        };

        if !matched {
            continue;
        }

        if decided.is_none() {
            decided = Some(rule);
            if !rule.action.continue_on_match {
                break;
            }
        } else if let Some(label) = side_effect_label(rule.action.effect) {
            required_actions.push(label.to_string());
        }
    }

    let (effect, reason, matched_rule, allowed) = match decided {
        Some(rule) => {
            let mut allowed = rule.action.effect == Effect::Allow;
            let mut effect = rule.action.effect;
            if effect == Effect::RequireApproval && request.has_approval {
                if let Some(approval) = &rule.action.approval {
                    let approvers_ok = request.approval_count >= approval.min_approvers;
                    let roles_ok = approval.required_roles.is_empty()
                        || approval
                            .required_roles
                            .iter()
                            .all(|role| request.approver_roles.iter().any(|r| r == role));
                    if approvers_ok && roles_ok {
                        effect = Effect::Allow;
                        allowed = true;
                    }
                }
            }
            (effect, rule.action.reason.clone(), Some(rule.id.clone()), allowed)
        }
        None => (
            set.policy.default_action.effect,
            set.policy.default_action.reason.clone(),
            None,
            set.policy.default_action.effect == Effect::Allow,
        ),
    };

    Ok(PolicyEvaluationResult {
        allowed,
        effect,
        reason,
        matched_rule,
        required_actions,
        metadata: EvaluationMetadata {
            evaluated_at: Utc::now(),
            evaluation_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            rules_evaluated,
            policies_evaluated,
        },
    })
}

fn eval_safe(
    condition: &crate::types::PolicyCondition,
    request: &PolicyEvaluationRequest,
    rule_id: &str,
) -> Result<bool, PolicyError> {
    // `Custom` conditions are the sole variant whose evaluation is
    // caller-authored text; an empty expression is treated as a malformed
    // rule rather than silently matching everything.
    if let crate::types::PolicyCondition::Custom { expression } = condition {
        if expression.trim().is_empty() {
            return Err(PolicyError::EvaluationFailed {
                rule_id: rule_id.to_string(),
                message: "custom condition expression is empty".to_string(),
            });
        }
    }
    Ok(evaluate_condition(condition, request))
}

/// Risk-tier overlay, per spec §4.F step 6. Applied after rule evaluation;
/// a deny here overrides any rule-level allow.
pub fn apply_risk_tier_overlay(
    request: &PolicyEvaluationRequest,
    classification: &OperationClassification,
    tenant_max_tier_policy: &RiskTierPolicy,
    result: PolicyEvaluationResult,
) -> PolicyEvaluationResult {
    let current = request.context.current_tier;

    if current < classification.minimum_tier {
        return deny(result, format!(
            "current risk tier {current:?} is below the minimum {:?} required for '{}'",
            classification.minimum_tier, classification.operation
        ));
    }

    if tenant_max_tier_policy.tier < classification.minimum_tier {
        return deny(result, format!(
            "tenant's maximum risk tier {:?} is below the minimum {:?} required for '{}'",
            tenant_max_tier_policy.tier, classification.minimum_tier, classification.operation
        ));
    }

    if let Some(operation) = &request.context.operation {
        if !tenant_max_tier_policy.allowed_tools.allows(operation) {
            return deny(result, format!("operation '{operation}' is outside the tool allowlist for tier {current:?}"));
        }
        if tenant_max_tier_policy.blocked_operations.iter().any(|b| b == operation) {
            return deny(result, format!("operation '{operation}' is explicitly blocked at tier {current:?}"));
        }
    }

    result
}

fn side_effect_label(effect: Effect) -> Option<&'static str> {
    match effect {
        Effect::Notify => Some("notify"),
        Effect::LogOnly => Some("log_only"),
        Effect::Warn => Some("warn"),
        _ => None,
    }
}

fn deny(mut result: PolicyEvaluationResult, reason: String) -> PolicyEvaluationResult {
    result.allowed = false;
    result.effect = Effect::Deny;
    result.reason = Some(reason);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ApprovalConfig, Combinator, NumericOperator, PolicyAction, PolicyCondition, PolicyDocument,
        RequestContext, RequestResource, RiskTier, Scope, SchemaVersion,
    };
    use uuid::Uuid;

    fn base_request(complexity: f64, has_approval: bool, approval_count: u32) -> PolicyEvaluationRequest {
        PolicyEvaluationRequest {
            actor: "agent-1".into(),
            action: "repo.push".into(),
            resource: RequestResource {
                complexity: Some(complexity),
                ..Default::default()
            },
            context: RequestContext {
                source: "api".into(),
                timestamp: Utc::now(),
                request_id: Uuid::new_v4(),
                agent_confidence: None,
                hour_of_day: None,
                operation: None,
                current_tier: RiskTier::R2,
            },
            has_approval,
            approval_count,
            approver_roles: vec![],
        }
    }

    fn s3_policy() -> PolicyDocument {
        PolicyDocument {
            version: SchemaVersion::V2_0,
            name: "complexity-gate".into(),
            scope: Scope::Repo,
            scope_target: None,
            inheritance: Inheritance::Override,
            parent_policy_id: None,
            rules: vec![PolicyRule {
                id: "high-complexity".into(),
                name: "High complexity requires approval".into(),
                enabled: true,
                priority: 10,
                combinator: Combinator::And,
                conditions: vec![PolicyCondition::Complexity {
                    operator: NumericOperator::Gte,
                    threshold: 7.0,
                }],
                action: PolicyAction {
                    effect: Effect::RequireApproval,
                    reason: Some("complexity too high".into()),
                    approval: Some(ApprovalConfig {
                        min_approvers: 2,
                        required_roles: vec![],
                        timeout_hours: 24,
                        allow_self_approval: false,
                    }),
                    notification: None,
                    continue_on_match: false,
                },
            }],
            default_action: PolicyAction {
                effect: Effect::Allow,
                reason: None,
                approval: None,
                notification: None,
                continue_on_match: false,
            },
            metadata: Default::default(),
        }
    }

    #[test]
    fn s3_denies_without_approval_then_allows_with_it() {
        let policy = s3_policy();
        let set = ResolvedPolicySet { policy: &policy, parent: None };

        let denied = evaluate(&base_request(8.0, false, 0), &set).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.effect, Effect::RequireApproval);

        let approved = evaluate(&base_request(8.0, true, 2), &set).unwrap();
        assert!(approved.allowed);
        assert_eq!(approved.effect, Effect::Allow);
    }

    #[test]
    fn no_matching_rule_falls_back_to_default_action() {
        let policy = s3_policy();
        let set = ResolvedPolicySet { policy: &policy, parent: None };
        let result = evaluate(&base_request(2.0, false, 0), &set).unwrap();
        assert!(result.allowed);
        assert!(result.matched_rule.is_none());
    }

    #[test]
    fn strict_inheritance_rejects_colliding_rule_ids() {
        let mut parent = s3_policy();
        parent.rules[0].id = "shared-id".into();
        let mut child = s3_policy();
        child.inheritance = Inheritance::Strict;
        child.rules[0].id = "shared-id".into();

        let set = ResolvedPolicySet { policy: &child, parent: Some(&parent) };
        let err = resolve_rules(&set).unwrap_err();
        assert_eq!(err.code(), "ERR_EVALUATION_FAILED");
    }

    #[test]
    fn extend_inheritance_runs_parent_rules_before_child() {
        let mut parent = s3_policy();
        parent.rules[0].id = "parent-rule".into();
        parent.rules[0].priority = 5;
        let mut child = s3_policy();
        child.inheritance = Inheritance::Extend;
        child.rules[0].id = "child-rule".into();
        child.rules[0].priority = 20;

        let set = ResolvedPolicySet { policy: &child, parent: Some(&parent) };
        let rules = resolve_rules(&set).unwrap();
        assert_eq!(rules[0].id, "child-rule");
        assert_eq!(rules[1].id, "parent-rule");
    }
}
