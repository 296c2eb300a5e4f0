//! Condition evaluation against a request, component **F**'s predicate layer.
//!
//! `Custom` conditions fall back to a tiny boolean expression grammar
//! grounded on `packages/gate/src/dsl.rs`'s `evaluate`/`evaluate_single`.

use crate::glob::matches_any;
use crate::types::{LabelMatch, NumericOperator, PolicyCondition, TimeWindowMode};
use crate::types::PolicyEvaluationRequest;

pub fn evaluate(condition: &PolicyCondition, request: &PolicyEvaluationRequest) -> bool {
    match condition {
        PolicyCondition::Complexity { operator, threshold } => match request.resource.complexity {
            Some(value) => operator.apply(value, *threshold),
            None => false,
        },
        PolicyCondition::FilePattern { patterns } => request
            .resource
            .files
            .iter()
            .any(|f| matches_any(patterns, f)),
        PolicyCondition::Author { allowed } => request
            .resource
            .author
            .as_deref()
            .map(|a| allowed.iter().any(|x| x == a))
            .unwrap_or(false),
        PolicyCondition::TimeWindow { start_hour, end_hour, mode } => {
            let Some(hour) = request.context.hour_of_day else {
                return false;
            };
            let inside = match (start_hour, end_hour) {
                (Some(start), Some(end)) => hour >= *start && hour < *end,
                (Some(start), None) => hour >= *start,
                (None, Some(end)) => hour < *end,
                (None, None) => true,
            };
            match mode {
                TimeWindowMode::During => inside,
                TimeWindowMode::Outside => !inside,
            }
        }
        PolicyCondition::Repository { patterns } => request
            .resource
            .repo
            .as_deref()
            .map(|r| matches_any(patterns, r))
            .unwrap_or(false),
        PolicyCondition::Branch { patterns } => request
            .resource
            .branch
            .as_deref()
            .map(|b| matches_any(patterns, b))
            .unwrap_or(false),
        PolicyCondition::Label { labels, label_match } => {
            let present = |l: &str| request.resource.labels.iter().any(|rl| rl == l);
            match label_match {
                LabelMatch::Any => labels.iter().any(|l| present(l)),
                LabelMatch::All => !labels.is_empty() && labels.iter().all(|l| present(l)),
                LabelMatch::None => labels.iter().all(|l| !present(l)),
            }
        }
        PolicyCondition::Agent { operator, threshold } => match request.context.agent_confidence {
            Some(confidence) => operator.apply(confidence, *threshold),
            None => false,
        },
        PolicyCondition::Custom { expression } => custom_expr::evaluate(expression, request),
    }
}

/// A minimal boolean expression grammar for `custom` conditions:
/// `lhs OP rhs` where `lhs`/`rhs` are `action`, `actor`, `resource.<field>`,
/// or literals, and `OP` is one of `==`, `!=`, `>`, `<`, `>=`, `<=`.
mod custom_expr {
    use crate::types::PolicyEvaluationRequest;
    use serde_json::Value as JsonValue;

    pub fn evaluate(expression: &str, request: &PolicyEvaluationRequest) -> bool {
        let parts: Vec<&str> = expression.split("&&").collect();
        if parts.len() > 1 {
            return parts.iter().all(|p| evaluate_single(p.trim(), request));
        }
        let parts: Vec<&str> = expression.split("||").collect();
        if parts.len() > 1 {
            return parts.iter().any(|p| evaluate_single(p.trim(), request));
        }
        evaluate_single(expression.trim(), request)
    }

    fn evaluate_single(expr: &str, request: &PolicyEvaluationRequest) -> bool {
        for op in ["==", "!=", ">=", "<=", ">", "<"] {
            if let Some(idx) = expr.find(op) {
                let left = resolve(expr[..idx].trim(), request);
                let right = resolve(expr[idx + op.len()..].trim(), request);
                return match op {
                    "==" => left == right,
                    "!=" => left != right,
                    ">" => compare(&left, &right) == std::cmp::Ordering::Greater,
                    "<" => compare(&left, &right) == std::cmp::Ordering::Less,
                    ">=" => compare(&left, &right) != std::cmp::Ordering::Less,
                    "<=" => compare(&left, &right) != std::cmp::Ordering::Greater,
                    _ => false,
                };
            }
        }
        is_truthy(&resolve(expr, request))
    }

    fn resolve(token: &str, request: &PolicyEvaluationRequest) -> JsonValue {
        match token {
            "action" => return JsonValue::String(request.action.clone()),
            "actor" => return JsonValue::String(request.actor.clone()),
            "resource.repo" => return request.resource.repo.clone().map(JsonValue::String).unwrap_or(JsonValue::Null),
            "resource.branch" => return request.resource.branch.clone().map(JsonValue::String).unwrap_or(JsonValue::Null),
            "resource.complexity" => {
                return request
                    .resource
                    .complexity
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }
            "hasApproval" => return JsonValue::Bool(request.has_approval),
            _ => {}
        }

        if (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
            || (token.starts_with('"') && token.ends_with('"') && token.len() >= 2)
        {
            return JsonValue::String(token[1..token.len() - 1].to_string());
        }

        match token.to_lowercase().as_str() {
            "true" => return JsonValue::Bool(true),
            "false" => return JsonValue::Bool(false),
            "null" => return JsonValue::Null,
            _ => {}
        }

        if let Ok(n) = token.parse::<i64>() {
            return JsonValue::Number(n.into());
        }
        if let Ok(n) = token.parse::<f64>() {
            return serde_json::Number::from_f64(n).map(JsonValue::Number).unwrap_or(JsonValue::Null);
        }

        JsonValue::Null
    }

    fn compare(a: &JsonValue, b: &JsonValue) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (a, b) {
            (JsonValue::Number(a), JsonValue::Number(b)) => a
                .as_f64()
                .unwrap_or(0.0)
                .partial_cmp(&b.as_f64().unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
            (JsonValue::String(a), JsonValue::String(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    fn is_truthy(value: &JsonValue) -> bool {
        match value {
            JsonValue::Null => false,
            JsonValue::Bool(b) => *b,
            JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            JsonValue::String(s) => !s.is_empty(),
            JsonValue::Array(a) => !a.is_empty(),
            JsonValue::Object(o) => !o.is_empty(),
        }
    }
}
