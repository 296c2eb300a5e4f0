//! Policy schema validation and migration, component **E**.
//!
//! Structural validation rides on `serde`'s own typed deserialisation
//! (itself the statically typed replacement spec §9 calls for, in place of
//! the reference's runtime schema library); this module adds the semantic
//! checks `serde` cannot express and the version-migration chain.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::ValidationIssue;
use crate::types::{Effect, PolicyCondition, PolicyDocument, Scope};

fn rule_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex"))
}

/// One step in the migration chain: applies in place while
/// `doc["version"] == from`.
pub struct Migration {
    pub from: &'static str,
    pub to: &'static str,
    pub transform: fn(&mut Value),
}

/// Built-in migrations. `1.0 -> 1.1` adds the `combinator` field later
/// versions expect on every rule; `1.1 -> 2.0` adds `continueOnMatch`.
pub fn default_migrations() -> Vec<Migration> {
    vec![
        Migration {
            from: "1.0",
            to: "1.1",
            transform: |doc| {
                doc["version"] = Value::String("1.1".to_string());
                if let Some(rules) = doc.get_mut("rules").and_then(|r| r.as_array_mut()) {
                    for rule in rules {
                        if rule.get("combinator").is_none() {
                            rule["combinator"] = Value::String("and".to_string());
                        }
                    }
                }
            },
        },
        Migration {
            from: "1.1",
            to: "2.0",
            transform: |doc| {
                doc["version"] = Value::String("2.0".to_string());
                if let Some(action) = doc.get_mut("defaultAction") {
                    if action.get("continueOnMatch").is_none() {
                        action["continueOnMatch"] = Value::Bool(false);
                    }
                }
            },
        },
    ]
}

#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub auto_migrate: bool,
    pub include_warnings: bool,
    pub include_info: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            auto_migrate: true,
            include_warnings: true,
            include_info: true,
        }
    }
}

/// A statically compiled additional semantic check, run after the built-in
/// ones succeed. Non-capturing by design — per spec §9, custom checks are
/// "a table... statically compiled at startup", not arbitrary closures.
pub type CustomRule = fn(&PolicyDocument) -> Vec<ValidationIssue>;

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub document: Option<PolicyDocument>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
    pub migrated: bool,
    pub original_version: Option<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.document.is_some() && self.errors.is_empty()
    }
}

/// Validate (and optionally migrate) a raw JSON policy document.
pub fn validate(raw: &Value, options: &ValidateOptions, custom_rules: &[CustomRule]) -> ValidationOutcome {
    let mut working = raw.clone();
    let original_version = working.get("version").and_then(|v| v.as_str()).map(str::to_string);
    let mut migrated = false;

    if options.auto_migrate {
        let migrations = default_migrations();
        loop {
            let Some(current) = working.get("version").and_then(|v| v.as_str()).map(str::to_string) else {
                break;
            };
            let Some(step) = migrations.iter().find(|m| m.from == current) else {
                break;
            };
            (step.transform)(&mut working);
            migrated = true;
        }
    }

    let document: PolicyDocument = match serde_json::from_value(working) {
        Ok(doc) => doc,
        Err(e) => {
            let code = if migrated { "MIGRATION_FAILED" } else { "INVALID_SCHEMA" };
            return ValidationOutcome {
                document: None,
                errors: vec![ValidationIssue::new(code, "$", e.to_string())],
                warnings: vec![],
                info: vec![],
                migrated,
                original_version,
            };
        }
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut info = Vec::new();

    check_semantics(&document, &mut errors, &mut warnings, &mut info);

    if errors.is_empty() {
        for rule_fn in custom_rules {
            for issue in rule_fn(&document) {
                errors.push(issue);
            }
        }
    }

    ValidationOutcome {
        document: if errors.is_empty() { Some(document) } else { None },
        errors,
        warnings: if options.include_warnings { warnings } else { vec![] },
        info: if options.include_info { info } else { vec![] },
        migrated,
        original_version,
    }
}

fn check_semantics(
    doc: &PolicyDocument,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
    info: &mut Vec<ValidationIssue>,
) {
    if doc.scope == Scope::Global && doc.parent_policy_id.is_some() {
        errors.push(ValidationIssue::new(
            "INVALID_PARENT_SCOPE",
            "$.parentPolicyId",
            "a global-scope policy must not declare a parent policy",
        ));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for (i, rule) in doc.rules.iter().enumerate() {
        let path = format!("$.rules[{i}]");

        if !seen_ids.insert(rule.id.clone()) {
            errors.push(ValidationIssue::new(
                "DUPLICATE_RULE_ID",
                format!("{path}.id"),
                format!("rule id '{}' appears more than once", rule.id),
            ));
        }

        if !rule_id_pattern().is_match(&rule.id) {
            errors.push(ValidationIssue::new(
                "INVALID_SCHEMA",
                format!("{path}.id"),
                format!("rule id '{}' must match [a-zA-Z0-9_-]+", rule.id),
            ));
        }

        if rule.name.is_empty() || rule.name.chars().count() > 100 {
            errors.push(ValidationIssue::new(
                "INVALID_SCHEMA",
                format!("{path}.name"),
                "rule name must be 1..100 characters",
            ));
        }

        check_action(&rule.action, &format!("{path}.action"), errors);

        for (j, condition) in rule.conditions.iter().enumerate() {
            check_condition(condition, &format!("{path}.conditions[{j}]"), errors, warnings);
        }

        if !rule.enabled {
            warnings.push(ValidationIssue::new(
                "UNUSED_RULE",
                format!("{path}.enabled"),
                format!("rule '{}' is disabled and will never match", rule.id),
            ));
        }
    }

    check_action(&doc.default_action, "$.defaultAction", errors);

    if doc.rules.is_empty() {
        info.push(ValidationIssue::new(
            "INVALID_FIELD_VALUE",
            "$.rules",
            "policy document declares no rules; only defaultAction ever applies",
        ));
    }
}

fn check_action(action: &crate::types::PolicyAction, path: &str, errors: &mut Vec<ValidationIssue>) {
    if action.effect == Effect::RequireApproval && action.approval.is_none() {
        errors.push(ValidationIssue::new(
            "MISSING_APPROVAL_CONFIG",
            format!("{path}.approval"),
            "effect 'require_approval' requires an approval configuration",
        ));
    }
    if let Some(approval) = &action.approval {
        if approval.timeout_hours > 168 {
            errors.push(ValidationIssue::new(
                "INVALID_FIELD_VALUE",
                format!("{path}.approval.timeoutHours"),
                "approval timeout must not exceed 168 hours",
            ));
        }
        if approval.min_approvers == 0 {
            errors.push(ValidationIssue::new(
                "INVALID_FIELD_VALUE",
                format!("{path}.approval.minApprovers"),
                "minApprovers must be at least 1",
            ));
        }
    }
}

fn check_condition(
    condition: &PolicyCondition,
    path: &str,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    match condition {
        PolicyCondition::Complexity { threshold, .. } => {
            if !(0.0..=10.0).contains(threshold) {
                errors.push(ValidationIssue::new(
                    "INVALID_FIELD_VALUE",
                    format!("{path}.threshold"),
                    "complexity threshold must be within [0,10]",
                ));
            } else if *threshold >= 9.0 {
                warnings.push(ValidationIssue::new(
                    "HIGH_COMPLEXITY",
                    format!("{path}.threshold"),
                    "complexity threshold near the maximum rarely matches real requests",
                ));
            }
        }
        PolicyCondition::Agent { threshold, .. } => {
            if !(0.0..=1.0).contains(threshold) {
                errors.push(ValidationIssue::new(
                    "INVALID_FIELD_VALUE",
                    format!("{path}.threshold"),
                    "confidence threshold must be within [0,1]",
                ));
            }
        }
        PolicyCondition::FilePattern { patterns } | PolicyCondition::Repository { patterns } | PolicyCondition::Branch { patterns } => {
            for p in patterns {
                if p.is_empty() || p == "***" {
                    errors.push(ValidationIssue::new(
                        "INVALID_PATTERN",
                        path.to_string(),
                        format!("glob pattern '{p}' is empty or degenerate"),
                    ));
                }
            }
        }
        PolicyCondition::TimeWindow { start_hour, end_hour, .. } => {
            if let (Some(start), Some(end)) = (start_hour, end_hour) {
                if start >= end {
                    errors.push(ValidationIssue::new(
                        "INVALID_FIELD_VALUE",
                        path.to_string(),
                        "time_window startHour must be less than endHour",
                    ));
                }
            }
        }
        PolicyCondition::Author { .. } | PolicyCondition::Label { .. } | PolicyCondition::Custom { .. } => {}
    }
}
