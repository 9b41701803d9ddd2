//! Verification result types.
//!
//! Verification never raises to the caller — "not verified" is an expected
//! outcome, not an exception.  Each check is graded independently and all
//! are reported, so a partial failure is diagnosable from a single result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The aggregate outcome of verifying one stamp.
///
/// The four booleans correspond to the four independent checks: hash-chain
/// linkage, Merkle inclusion, external-chain confirmation, and signature
/// validity.  `verified` is true only when every check required for the
/// stamp's current status passed.  A check that could not execute (e.g. an
/// unreachable chain adapter) reports its cause in `error` and leaves its
/// boolean false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// The top-level verdict.
    pub verified: bool,

    /// The stamp this result describes.
    pub stamp_id: Uuid,

    /// The stamp's content hash, echoed for correlation.
    pub content_hash: String,

    /// The anchored Merkle root, when the stamp has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,

    /// The anchor's external-ledger transaction, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_tx: Option<String>,

    /// The external ledger the anchor targets, when anchored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,

    /// The block the anchor transaction landed in, when confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,

    /// Check 1: the agent's chain up to this event has intact linkage and
    /// correct recomputed hashes.
    pub hash_chain_valid: bool,

    /// Check 2: the stored Merkle proof reconstructs the anchored root.
    pub merkle_included: bool,

    /// Check 3: the external ledger still reports the anchor transaction
    /// as included (detects reorgs and rollbacks).
    pub chain_verified: bool,

    /// Check 4: the event's signature validates against the agent's
    /// registered key.  False (without failing `verified`) for unsigned
    /// events.
    pub signature_verified: bool,

    /// Causes for checks that failed or could not execute, `; `-joined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
