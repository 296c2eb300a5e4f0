//! Policy schema validation and rule evaluation.
//!
//! Ties together the schema validator (component **E**) and the evaluation
//! engine (component **F**).

pub mod condition;
pub mod engine;
pub mod error;
pub mod glob;
pub mod schema;
pub mod types;

pub use engine::{apply_risk_tier_overlay, evaluate, resolve_rules, ResolvedPolicySet};
pub use error::{PolicyError, ValidationIssue};
pub use schema::{default_migrations, validate, CustomRule, Migration, ValidateOptions, ValidationOutcome};
pub use types::*;
