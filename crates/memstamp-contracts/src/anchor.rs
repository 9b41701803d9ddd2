//! Anchor record types — one published Merkle root per closed batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The external-ledger lifecycle of an anchor.
///
/// `pending → submitted → confirmed → finalized` is the happy path.
/// `failed` is terminal: the retry cap was exhausted or the chain rejected
/// the transaction, and the batch's stamps must be re-batched.  A failed
/// anchor is surfaced to operators, never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    /// Created from a closed batch; not yet submitted to the chain.
    Pending,
    /// Submitted; transaction hash known, block inclusion not yet seen.
    Submitted,
    /// Included in a block.
    Confirmed,
    /// Confirmations reached the configured finality threshold.
    Finalized,
    /// Terminal failure after the retry cap.  Stamps are re-batched.
    Failed,
}

impl AnchorStatus {
    /// True for the states the confirmation poller still advances.
    pub fn is_awaiting_finality(&self) -> bool {
        matches!(self, AnchorStatus::Submitted | AnchorStatus::Confirmed)
    }
}

/// A published Merkle root plus its external-ledger transaction reference.
///
/// One `AnchorRecord` covers every stamp of one closed batch (1:N via the
/// stamps' `anchor_id`).  `tx_hash` and `block_number` are populated
/// asynchronously as the chain adapter submits and confirms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Unique anchor id.
    pub id: Uuid,

    /// The batch this anchor covers.  Publication is idempotent on this
    /// key: the same batch never yields two anchor records.
    pub batch_id: Uuid,

    /// The Merkle root computed over the batch's content hashes, in
    /// enqueue order.
    pub merkle_root: String,

    /// How many events the root covers.
    pub event_count: u64,

    /// When the batch opened (first enqueue).
    pub start_time: DateTime<Utc>,

    /// When the batch closed.
    pub end_time: DateTime<Utc>,

    /// Which external ledger this anchor targets (selects the adapter).
    pub chain: String,

    /// Transaction hash on the external ledger, once submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,

    /// Block the transaction landed in, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,

    /// Confirmations observed so far.
    pub confirmations: u32,

    /// Where this anchor is in its lifecycle.
    pub status: AnchorStatus,

    /// When the anchor record was created.
    pub created_at: DateTime<Utc>,

    /// When block inclusion was first observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,

    /// The last submission error, kept for operator diagnosis.  Set on
    /// every failed attempt and left in place on terminal failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
