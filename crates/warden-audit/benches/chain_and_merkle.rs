use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use uuid::Uuid;
use warden_audit::{
    Action, ActionCategory, Actor, AuditContext, AuditEntryInput, ChainBuilder, MerkleTree, Outcome,
};
use warden_core::SystemClock;
use warden_hash::HashAlgorithm;

const BATCH_SIZE: usize = 1_000;

fn sample_input() -> AuditEntryInput {
    AuditEntryInput::new(
        Actor::Agent {
            id: "agent-bench".into(),
            on_behalf_of: None,
        },
        Action {
            category: ActionCategory::Push,
            action_type: "repo.push".into(),
            sensitive: false,
            description: None,
        },
        Outcome::Success,
        AuditContext {
            tenant_id: "tenant-bench".into(),
            ..Default::default()
        },
    )
}

fn bench_build_entry(c: &mut Criterion) {
    let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
    c.bench_function("chain_builder_build_entry", |b| {
        b.iter(|| black_box(builder.build_entry(sample_input())));
    });
}

fn bench_merkle_build_and_proof(c: &mut Criterion) {
    let builder = ChainBuilder::new(HashAlgorithm::Sha256, Arc::new(SystemClock));
    let leaves: Vec<(Uuid, String)> = (0..BATCH_SIZE)
        .map(|_| {
            let entry = builder.build_entry(sample_input());
            (entry.id, entry.chain.content_hash)
        })
        .collect();

    c.bench_function("merkle_build_1000_leaves", |b| {
        b.iter(|| black_box(MerkleTree::build(&leaves, HashAlgorithm::Sha256)));
    });

    let tree = MerkleTree::build(&leaves, HashAlgorithm::Sha256);
    let target = leaves[BATCH_SIZE / 2].0;
    c.bench_function("merkle_proof_for_one_leaf", |b| {
        b.iter(|| black_box(tree.proof(target)));
    });
}

criterion_group!(benches, bench_build_entry, bench_merkle_build_and_proof);
criterion_main!(benches);
