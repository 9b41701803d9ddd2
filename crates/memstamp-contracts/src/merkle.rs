//! Merkle proof types shared between the builder and the verifier.

use serde::{Deserialize, Serialize};

/// Which side of the pair the sibling hash sits on.
///
/// `Left` means the sibling is the left operand when recombining
/// (`hash(sibling || current)`); `Right` means it is the right operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofPosition {
    Left,
    Right,
}

/// One step of a Merkle inclusion proof: a sibling hash and its side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: String,
    pub position: ProofPosition,
}

/// A sibling-hash path proving one leaf's inclusion in a Merkle root.
///
/// Invariant: folding `leaf` through `steps` in order, combining per each
/// step's position, must reproduce `root`.  The verifier checks exactly
/// this and nothing else — the proof is self-contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The leaf being proven (a stamp's `content_hash`).
    pub leaf: String,
    /// Sibling hashes from the leaf level up to just below the root.
    pub steps: Vec<ProofStep>,
    /// The root this proof claims to reconstruct.
    pub root: String,
}
