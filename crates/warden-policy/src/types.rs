//! Policy document data model, per spec §3.
//!
//! Grounded on `packages/gate/src/policy.rs`'s `Policy`/`PolicyRule` shape,
//! generalised from the teacher's flat `condition: String` DSL field into
//! the typed tagged-variant conditions this model requires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version a `PolicyDocument` was authored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "2.0")]
    V2_0,
}

impl SchemaVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V2_0 => "2.0",
        }
    }
}

/// Where in the org/repo/branch hierarchy a policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Org,
    Repo,
    Branch,
}

/// How a policy's rules combine with its parent's, per spec §3/§9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inheritance {
    /// This policy's rules fully replace the parent's.
    Override,
    /// This policy's rules are appended after the parent's.
    Extend,
    /// Rules are merged; any rule-id collision between parent and child fails evaluation.
    Strict,
}

/// A policy document: an ordered set of rules plus inheritance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub version: SchemaVersion,
    pub name: String,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_target: Option<String>,
    pub inheritance: Inheritance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_policy_id: Option<String>,
    pub rules: Vec<PolicyRule>,
    pub default_action: PolicyAction,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// How a rule's conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    And,
    Or,
}

impl Default for Combinator {
    fn default() -> Self {
        Self::And
    }
}

/// One rule within a policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Must match `[a-zA-Z0-9_-]+`, checked by the validator.
    pub id: String,
    /// 1..100 characters, checked by the validator.
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
    pub action: PolicyAction,
}

fn default_true() -> bool {
    true
}

/// Numeric comparison used by `complexity` and `agent` confidence conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericOperator {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
}

impl NumericOperator {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
            Self::Eq => (lhs - rhs).abs() < f64::EPSILON,
            Self::Gte => lhs >= rhs,
            Self::Gt => lhs > rhs,
        }
    }
}

/// How a set of labels must match against the resource's labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    Any,
    All,
    None,
}

/// Whether a time window condition matches inside or outside its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindowMode {
    During,
    Outside,
}

/// A typed, tagged-variant predicate evaluated against a request.
///
/// Replaces the reference's dynamically parsed condition strings with a
/// statically typed model, per spec §9's "dynamic parsed validators" note —
/// `Custom` is the sole escape hatch, kept narrow and grounded on
/// `packages/gate/src/dsl.rs`'s tiny expression grammar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum PolicyCondition {
    Complexity {
        operator: NumericOperator,
        /// Bound to `[0,10]` by the validator.
        threshold: f64,
    },
    FilePattern {
        /// Glob patterns matched against `resource.files`.
        patterns: Vec<String>,
    },
    Author {
        allowed: Vec<String>,
    },
    TimeWindow {
        #[serde(skip_serializing_if = "Option::is_none")]
        start_hour: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_hour: Option<u8>,
        #[serde(default)]
        mode: TimeWindowMode,
    },
    Repository {
        patterns: Vec<String>,
    },
    Branch {
        patterns: Vec<String>,
    },
    Label {
        labels: Vec<String>,
        #[serde(rename = "match")]
        label_match: LabelMatch,
    },
    Agent {
        operator: NumericOperator,
        /// Bound to `[0,1]` by the validator.
        threshold: f64,
    },
    Custom {
        /// A small boolean expression, grounded on the reference DSL grammar.
        expression: String,
    },
}

impl Default for TimeWindowMode {
    fn default() -> Self {
        Self::During
    }
}

/// The effect a matched (or default) rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
    RequireApproval,
    Notify,
    LogOnly,
    Warn,
}

/// Approval requirements for a `require_approval` effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalConfig {
    pub min_approvers: u32,
    #[serde(default)]
    pub required_roles: Vec<String>,
    /// Capped at 168 by the validator.
    #[serde(default = "default_timeout_hours")]
    pub timeout_hours: u32,
    #[serde(default)]
    pub allow_self_approval: bool,
}

fn default_timeout_hours() -> u32 {
    24
}

/// Notification routing hints attached to a `PolicyAction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// What a matched rule (or a policy's `defaultAction`) does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAction {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationConfig>,
    #[serde(default)]
    pub continue_on_match: bool,
}

/// Totally ordered risk tiers, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    R0,
    R1,
    R2,
    R3,
    R4,
}

/// Tool allowlist for a given tier: either a fixed set or unrestricted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ToolAllowlist {
    All,
    Only { tools: Vec<String> },
}

impl ToolAllowlist {
    pub fn allows(&self, tool: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only { tools } => tools.iter().any(|t| t == tool),
        }
    }
}

/// Per-tier behaviour, set by the host at startup (not part of a policy document).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTierPolicy {
    pub tier: RiskTier,
    pub requires_approval: bool,
    pub requires_audit: bool,
    pub secrets_scanning_enabled: bool,
    pub tamper_evident_logging_enabled: bool,
    pub allowed_tools: ToolAllowlist,
    #[serde(default)]
    pub blocked_operations: Vec<String>,
}

/// Classification of one operation type, used by the risk-tier overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationClassification {
    pub operation: String,
    pub minimum_tier: RiskTier,
    pub category: String,
    #[serde(default)]
    pub required_approval_scopes: Vec<String>,
    #[serde(default)]
    pub audit_fields: Vec<String>,
}

/// Resource coordinates attached to a request, per spec §6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Trace/provenance context attached to a request, per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    /// Confidence score `[0,1]` of an upstream agent decision, consumed by
    /// the `agent` condition. Not named in spec §6's request shape, added so
    /// `agent` conditions (§3) have a concrete field to read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_confidence: Option<f64>,
    /// Hour-of-day (0-23, host local time) used by `time_window` conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour_of_day: Option<u8>,
    /// Requested tool/operation, used by the risk-tier overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub current_tier: RiskTier,
}

/// The request a policy engine evaluates, per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEvaluationRequest {
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub resource: RequestResource,
    pub context: RequestContext,
    #[serde(default)]
    pub has_approval: bool,
    #[serde(default)]
    pub approval_count: u32,
    #[serde(default)]
    pub approver_roles: Vec<String>,
}

/// Timing/bookkeeping attached to an evaluation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMetadata {
    pub evaluated_at: DateTime<Utc>,
    pub evaluation_time_ms: f64,
    pub rules_evaluated: u32,
    pub policies_evaluated: u32,
}

/// The outcome of evaluating a request against a resolved rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEvaluationResult {
    pub allowed: bool,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    #[serde(default)]
    pub required_actions: Vec<String>,
    pub metadata: EvaluationMetadata,
}
