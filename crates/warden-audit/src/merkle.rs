//! Merkle tree summarisation and inclusion proofs — component **C**.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_hash::{digest, empty_digest, HashAlgorithm};

/// Which side of a parent node a sibling hash sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One sibling hash on the path from a leaf to the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling_hash: String,
    pub side: Side,
}

/// A Merkle inclusion proof for one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    pub entry_id: Uuid,
    pub leaf_hash: String,
    pub path: Vec<ProofStep>,
    pub root_hash: String,
}

/// A Merkle tree built over an ordered batch of (entry id, content hash) leaves.
pub struct MerkleTree {
    algorithm: HashAlgorithm,
    /// `layers[0]` is the (padded) leaf layer; the last layer has one node, the root.
    layers: Vec<Vec<String>>,
    leaf_ids: Vec<Uuid>,
}

impl MerkleTree {
    /// Build a tree over `leaves`, an ordered list of `(entry_id, content_hash)`.
    ///
    /// Empty input yields an empty-string root. A single leaf is its own
    /// root. Otherwise, the leaf layer is right-padded with `hash("")` up to
    /// the next power of two and combined pairwise, `parent = H(left ∥
    /// right)`, until one root remains.
    pub fn build(leaves: &[(Uuid, String)], algorithm: HashAlgorithm) -> Self {
        if leaves.is_empty() {
            return Self {
                algorithm,
                layers: vec![vec![]],
                leaf_ids: vec![],
            };
        }

        let leaf_ids: Vec<Uuid> = leaves.iter().map(|(id, _)| *id).collect();
        let mut leaf_hashes: Vec<String> = leaves.iter().map(|(_, h)| h.clone()).collect();

        if leaf_hashes.len() > 1 {
            let padded_len = leaf_hashes.len().next_power_of_two();
            let pad = empty_digest(algorithm);
            leaf_hashes.resize(padded_len, pad);
        }

        let mut layers = vec![leaf_hashes];
        while layers.last().unwrap().len() > 1 {
            let prev = layers.last().unwrap();
            let mut next = Vec::with_capacity(prev.len() / 2);
            for pair in prev.chunks(2) {
                let combined = [pair[0].clone(), pair[1].clone()].concat();
                next.push(digest(combined.as_bytes(), algorithm));
            }
            layers.push(next);
        }

        Self { algorithm, layers, leaf_ids }
    }

    /// Root hash; `""` for an empty tree.
    pub fn root(&self) -> String {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .cloned()
            .unwrap_or_default()
    }

    /// Tree depth: `ceil(log2(n)) + 1` for `n > 0`, `0` for an empty tree.
    pub fn depth(&self) -> u32 {
        let n = self.leaf_ids.len();
        if n == 0 {
            return 0;
        }
        if n == 1 {
            return 1;
        }
        (n as f64).log2().ceil() as u32 + 1
    }

    /// Build an inclusion proof for `entry_id`, if present in this tree.
    pub fn proof(&self, entry_id: Uuid) -> Option<MerkleProof> {
        let index = self.leaf_ids.iter().position(|id| *id == entry_id)?;
        let leaf_hash = self.layers[0][index].clone();

        if self.layers.len() == 1 {
            return Some(MerkleProof {
                entry_id,
                leaf_hash: leaf_hash.clone(),
                path: vec![],
                root_hash: leaf_hash,
            });
        }

        let mut path = Vec::new();
        let mut idx = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_idx = idx ^ 1;
            let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
            path.push(ProofStep {
                sibling_hash: layer[sibling_idx].clone(),
                side,
            });
            idx /= 2;
        }

        Some(MerkleProof {
            entry_id,
            leaf_hash,
            path,
            root_hash: self.root(),
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

/// Recompute the root from `proof` and check it matches `proof.root_hash`.
pub fn verify_proof(proof: &MerkleProof, algorithm: HashAlgorithm) -> bool {
    let mut acc = proof.leaf_hash.clone();
    for step in &proof.path {
        acc = match step.side {
            // The sibling is to the right of `acc`.
            Side::Right => digest([acc.as_str(), step.sibling_hash.as_str()].concat().as_bytes(), algorithm),
            // The sibling is to the left of `acc`.
            Side::Left => digest([step.sibling_hash.as_str(), acc.as_str()].concat().as_bytes(), algorithm),
        };
    }
    acc == proof.root_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<(Uuid, String)> {
        (0..n)
            .map(|i| (Uuid::new_v4(), digest(format!("leaf-{i}").as_bytes(), HashAlgorithm::Sha256)))
            .collect()
    }

    #[test]
    fn empty_tree_has_empty_root() {
        let tree = MerkleTree::build(&[], HashAlgorithm::Sha256);
        assert_eq!(tree.root(), "");
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let ls = leaves(1);
        let tree = MerkleTree::build(&ls, HashAlgorithm::Sha256);
        assert_eq!(tree.root(), ls[0].1);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn s2_proof_for_each_of_four_leaves_verifies() {
        let ls = leaves(4);
        let tree = MerkleTree::build(&ls, HashAlgorithm::Sha256);
        for (id, _) in &ls {
            let proof = tree.proof(*id).unwrap();
            assert!(verify_proof(&proof, HashAlgorithm::Sha256));
            assert_eq!(proof.root_hash, tree.root());
        }
    }

    #[test]
    fn s2_tampered_leaf_hash_fails_verification() {
        let ls = leaves(4);
        let tree = MerkleTree::build(&ls, HashAlgorithm::Sha256);
        let mut proof = tree.proof(ls[1].0).unwrap();
        proof.leaf_hash = digest(b"tampered", HashAlgorithm::Sha256);
        assert!(!verify_proof(&proof, HashAlgorithm::Sha256));
    }

    #[test]
    fn odd_leaf_count_is_padded() {
        let ls = leaves(3);
        let tree = MerkleTree::build(&ls, HashAlgorithm::Sha256);
        for (id, _) in &ls {
            let proof = tree.proof(*id).unwrap();
            assert!(verify_proof(&proof, HashAlgorithm::Sha256));
        }
    }

    #[test]
    fn unknown_entry_id_has_no_proof() {
        let ls = leaves(4);
        let tree = MerkleTree::build(&ls, HashAlgorithm::Sha256);
        assert!(tree.proof(Uuid::new_v4()).is_none());
    }
}
