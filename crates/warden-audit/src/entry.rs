//! The `AuditEntry` data model, per spec §3 and the wire form in spec §6.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use chrono::{DateTime, Utc};
use warden_hash::{HashAlgorithm, Signature};

/// Who performed the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum Actor {
    User {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_behalf_of: Option<Box<Actor>>,
    },
    Agent {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_behalf_of: Option<Box<Actor>>,
    },
    Service {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_behalf_of: Option<Box<Actor>>,
    },
    GithubApp {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_behalf_of: Option<Box<Actor>>,
    },
    ApiKey {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_behalf_of: Option<Box<Actor>>,
    },
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::User { id, .. }
            | Actor::Agent { id, .. }
            | Actor::Service { id, .. }
            | Actor::GithubApp { id, .. }
            | Actor::ApiKey { id, .. } => id,
        }
    }
}

/// High-level action category, used for audit filtering and risk tiering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Commit,
    Push,
    PullRequestMerge,
    Deploy,
    PolicyChange,
    Other,
}

/// The action being recorded: category, dotted type, sensitivity, description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub category: ActionCategory,
    /// Dotted type, e.g. `"repo.push.force"`.
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outcome of the recorded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

/// Optional pointer to the resource the action targeted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request/trace context, per spec §6 wire form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContext {
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// The exact field list `contextHash` summarises, per spec §6:
/// `[tenantId, orgId, repoId, runId, traceId]` intersected with set fields.
pub const CONTEXT_HASH_FIELDS: [&str; 5] = ["tenantId", "orgId", "repoId", "runId", "traceId"];

/// A hash over a fixed subset of `AuditContext`, recorded alongside the field
/// list that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextHash {
    pub algorithm: HashAlgorithm,
    pub value: String,
    pub fields: Vec<String>,
}

/// Compute the context hash over exactly the set fields in `CONTEXT_HASH_FIELDS`.
pub fn compute_context_hash(ctx: &AuditContext, algo: HashAlgorithm) -> ContextHash {
    let mut map = serde_json::Map::new();
    let mut fields = Vec::new();
    if !ctx.tenant_id.is_empty() {
        map.insert("tenantId".into(), serde_json::Value::String(ctx.tenant_id.clone()));
        fields.push("tenantId".to_string());
    }
    if let Some(v) = &ctx.org_id {
        map.insert("orgId".into(), serde_json::Value::String(v.clone()));
        fields.push("orgId".to_string());
    }
    if let Some(v) = &ctx.repo_id {
        map.insert("repoId".into(), serde_json::Value::String(v.clone()));
        fields.push("repoId".to_string());
    }
    if let Some(v) = &ctx.run_id {
        map.insert("runId".into(), serde_json::Value::String(v.clone()));
        fields.push("runId".to_string());
    }
    if let Some(v) = &ctx.trace_id {
        map.insert("traceId".into(), serde_json::Value::String(v.clone()));
        fields.push("traceId".to_string());
    }
    let bytes = warden_hash::canonical_bytes(&serde_json::Value::Object(map));
    let value = warden_hash::digest(&bytes, algo);
    ContextHash { algorithm: algo, value, fields }
}

/// The chain linkage for one entry, per spec §3/§4.B.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    pub sequence: u64,
    pub previous_hash: Option<String>,
    pub content_hash: String,
    pub algorithm: HashAlgorithm,
    pub computed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

/// An opaque, semi-structured details bag. Never a language-specific dynamic
/// object: just an ordered map of JSON values, per spec §9's "any-shape
/// details fields" design note.
pub type DetailsBag = BTreeMap<String, serde_json::Value>;

/// One immutable, hash-chained audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    pub outcome: Outcome,
    pub context: AuditContext,
    pub chain: ChainLink,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_hash: Option<ContextHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub high_risk: bool,
    #[serde(default)]
    pub compliance: Vec<String>,
    #[serde(default)]
    pub details: DetailsBag,
}

/// Input to the chain builder: everything about an entry except what the
/// builder itself fills in (`id`, `timestamp` if absent, `chain`).
#[derive(Debug, Clone)]
pub struct AuditEntryInput {
    pub id: Option<Uuid>,
    pub timestamp: Option<DateTime<Utc>>,
    pub actor: Actor,
    pub action: Action,
    pub resource: Option<Resource>,
    pub outcome: Outcome,
    pub context: AuditContext,
    pub tags: Vec<String>,
    pub high_risk: bool,
    pub compliance: Vec<String>,
    pub details: DetailsBag,
}

impl AuditEntryInput {
    pub fn new(actor: Actor, action: Action, outcome: Outcome, context: AuditContext) -> Self {
        Self {
            id: None,
            timestamp: None,
            actor,
            action,
            resource: None,
            outcome,
            context,
            tags: Vec::new(),
            high_risk: false,
            compliance: Vec::new(),
            details: DetailsBag::new(),
        }
    }
}

/// Tags are capped at 50 entries per spec §6.
pub const MAX_TAGS: usize = 50;
