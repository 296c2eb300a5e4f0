//! Tamper-evident, hash-chained audit log with Merkle summarisation.
//!
//! Ties together the entry data model (component **A**), the chain builder
//! (**B**), Merkle summarisation (**C**), and the store contract (**D**).

pub mod chain;
pub mod entry;
pub mod error;
pub mod merkle;
pub mod store;
pub mod verify;

pub use chain::{compute_content_hash, ChainBuilder};
pub use entry::{
    compute_context_hash, Action, ActionCategory, Actor, AuditContext, AuditEntry, AuditEntryInput,
    ChainLink, ContextHash, DetailsBag, Outcome, Resource, CONTEXT_HASH_FIELDS, MAX_TAGS,
};
pub use error::AuditError;
pub use merkle::{verify_proof, MerkleProof, MerkleTree, ProofStep, Side};
pub use store::{AuditLogMetadata, AuditStore, InMemoryAuditStore, LogKey, QueryFilter, SortOrder};
pub use verify::{verify_chain, AuditVerificationResult};
