//! Merkle tree builder and inclusion-proof verification.
//!
//! A tree is built bottom-up over an ordered sequence of content hashes.
//! Leaf order is significant: the batcher's enqueue order is the leaf
//! order, and the same ordered input always yields the same root.
//!
//! Pair combination works on raw digest bytes: both operands are stripped
//! of their `sha256:` prefix, hex-decoded, concatenated left-then-right,
//! and hashed with SHA-256.  An odd node at any level is paired with a
//! duplicate of itself, which keeps proof lengths symmetric across leaves.

use sha2::{Digest, Sha256};

use memstamp_contracts::{
    merkle::{MerkleProof, ProofPosition, ProofStep},
    MemstampError, MemstampResult,
};

use crate::hash::{decode_hash, encode_hash, is_valid_content_hash};

/// Combine two digests into their parent: `sha256(left || right)`.
fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// A fully materialized Merkle tree over one batch of content hashes.
///
/// Keeps every level so per-leaf proofs can be derived without rebuilding.
/// Level 0 is the leaves; the last level holds the single root.
#[derive(Debug)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree over `leaves` in the given order.
    ///
    /// # Errors
    ///
    /// - `EmptyBatch` for zero leaves — there is nothing to anchor.
    /// - `InvalidContentHash` if any leaf violates the hash format.  The
    ///   ledger rejects malformed hashes at ingestion, so this only fires
    ///   on misuse of the builder itself.
    pub fn build(leaves: &[String]) -> MemstampResult<Self> {
        if leaves.is_empty() {
            return Err(MemstampError::EmptyBatch);
        }

        let mut level: Vec<[u8; 32]> = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            if !is_valid_content_hash(leaf) {
                return Err(MemstampError::InvalidContentHash {
                    value: leaf.clone(),
                });
            }
            // Format was just validated, so decoding cannot fail.
            match decode_hash(leaf) {
                Some(digest) => level.push(digest),
                None => {
                    return Err(MemstampError::InvalidContentHash {
                        value: leaf.clone(),
                    })
                }
            }
        }

        let mut levels = vec![level];
        while levels.last().map(|l| l.len()).unwrap_or(0) > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                // Odd node: duplicate itself.
                let right = pair.get(1).unwrap_or(left);
                next.push(hash_pair(left, right));
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The number of leaves the tree covers.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// The root, rendered with the `sha256:` prefix.
    ///
    /// A single-leaf tree's root is the leaf itself.
    pub fn root(&self) -> String {
        let top = &self.levels[self.levels.len() - 1];
        encode_hash(&top[0])
    }

    /// The inclusion proof for leaf `index`, or `None` if out of range.
    ///
    /// At each level the step records the sibling's hash and which side of
    /// the combination the sibling occupies.  For a duplicated odd node the
    /// sibling is the node itself.
    pub fn proof_for(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut steps = Vec::new();
        let mut current = index;

        // Walk every level except the root.
        for level in &self.levels[..self.levels.len() - 1] {
            let is_right_node = current % 2 == 1;
            let sibling_index = if is_right_node { current - 1 } else { current + 1 };
            let sibling = if sibling_index < level.len() {
                &level[sibling_index]
            } else {
                // Duplicated odd node pairs with itself.
                &level[current]
            };
            steps.push(ProofStep {
                hash: encode_hash(sibling),
                position: if is_right_node {
                    ProofPosition::Left
                } else {
                    ProofPosition::Right
                },
            });
            current /= 2;
        }

        Some(MerkleProof {
            leaf: encode_hash(&self.levels[0][index]),
            steps,
            root: self.root(),
        })
    }

    /// Proofs for every leaf, in leaf order.
    pub fn proofs(&self) -> Vec<MerkleProof> {
        (0..self.leaf_count())
            .filter_map(|i| self.proof_for(i))
            .collect()
    }
}

/// Recompute the root from a proof and compare it to the recorded one.
///
/// Folds the leaf through each step, combining with the sibling on its
/// recorded side.  Returns `false` — never panics, never errors — for any
/// malformed hash inside the proof.
pub fn verify_proof(proof: &MerkleProof) -> bool {
    let mut current = match decode_hash(&proof.leaf) {
        Some(digest) => digest,
        None => return false,
    };

    for step in &proof.steps {
        let sibling = match decode_hash(&step.hash) {
            Some(digest) => digest,
            None => return false,
        };
        current = match step.position {
            ProofPosition::Left => hash_pair(&sibling, &current),
            ProofPosition::Right => hash_pair(&current, &sibling),
        };
    }

    encode_hash(&current) == proof.root
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::hash::compute_hash;

    use super::*;

    /// Deterministic, distinct, well-formed leaf hashes.
    fn leaves(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| compute_hash(&json!({ "leaf": i })))
            .collect()
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = MerkleTree::build(&[]).unwrap_err();
        assert!(matches!(err, MemstampError::EmptyBatch));
    }

    #[test]
    fn malformed_leaf_is_rejected() {
        let mut batch = leaves(2);
        batch.push("sha256:nothex".to_string());
        let err = MerkleTree::build(&batch).unwrap_err();
        assert!(matches!(err, MemstampError::InvalidContentHash { .. }));
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let batch = leaves(1);
        let tree = MerkleTree::build(&batch).unwrap();
        assert_eq!(tree.root(), batch[0]);

        let proof = tree.proof_for(0).unwrap();
        assert!(proof.steps.is_empty());
        assert!(verify_proof(&proof));
    }

    #[test]
    fn same_ordered_input_same_root() {
        let batch = leaves(5);
        let a = MerkleTree::build(&batch).unwrap();
        let b = MerkleTree::build(&batch).unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn leaf_order_is_significant() {
        let batch = leaves(4);
        let mut reversed = batch.clone();
        reversed.reverse();
        let a = MerkleTree::build(&batch).unwrap();
        let b = MerkleTree::build(&reversed).unwrap();
        assert_ne!(a.root(), b.root());
    }

    /// Every proof at every tree size — including the odd-count duplication
    /// cases — must reconstruct the root.
    #[test]
    fn proof_round_trip_all_indices() {
        for n in 1..=9 {
            let batch = leaves(n);
            let tree = MerkleTree::build(&batch).unwrap();
            for (i, leaf) in batch.iter().enumerate() {
                let proof = tree.proof_for(i).unwrap();
                assert_eq!(&proof.leaf, leaf);
                assert_eq!(proof.root, tree.root());
                assert!(verify_proof(&proof), "proof failed for leaf {} of {}", i, n);
            }
        }
    }

    #[test]
    fn odd_leaf_proof_lengths_are_symmetric() {
        let batch = leaves(5);
        let tree = MerkleTree::build(&batch).unwrap();
        let lengths: Vec<usize> = tree.proofs().iter().map(|p| p.steps.len()).collect();
        // Duplication policy: every leaf gets the same proof depth.
        assert!(lengths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let batch = leaves(4);
        let tree = MerkleTree::build(&batch).unwrap();

        let mut proof = tree.proof_for(2).unwrap();
        // Substitute a different well-formed hash for the claimed leaf.
        proof.leaf = compute_hash(&json!({ "leaf": "tampered" }));
        assert!(!verify_proof(&proof));
    }

    #[test]
    fn tampered_sibling_fails_verification() {
        let batch = leaves(4);
        let tree = MerkleTree::build(&batch).unwrap();

        let mut proof = tree.proof_for(0).unwrap();
        proof.steps[1].hash = compute_hash(&json!({ "sibling": "forged" }));
        assert!(!verify_proof(&proof));
    }

    #[test]
    fn malformed_proof_hash_is_false_not_panic() {
        let batch = leaves(2);
        let tree = MerkleTree::build(&batch).unwrap();

        let mut proof = tree.proof_for(0).unwrap();
        proof.steps[0].hash = "sha256:not-hex-at-all".to_string();
        assert!(!verify_proof(&proof));

        let mut proof = tree.proof_for(0).unwrap();
        proof.leaf = "garbage".to_string();
        assert!(!verify_proof(&proof));
    }
}
