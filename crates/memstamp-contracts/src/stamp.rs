//! Stamp types — the client-visible record of one attested event.
//!
//! A `Stamp` wraps an `Event` with its anchoring lifecycle: created
//! `pending` at ingestion, flipped to `anchored` once its batch's Merkle
//! root is published, and observed as `verified` after a successful
//! verification call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{Event, EventType};
use crate::merkle::MerkleProof;

/// The anchoring lifecycle state of a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampStatus {
    /// Appended to the ledger, waiting for a batch to close.
    Pending,
    /// Included in a published batch; carries a Merkle proof.
    Anchored,
    /// A verification call succeeded against this stamp.
    Verified,
}

/// The client-visible record of one attested event and its anchoring state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamp {
    /// Unique stamp id, distinct from the wrapped event's id.
    pub id: Uuid,

    /// The immutable ledger event this stamp attests.
    pub event: Event,

    /// Where this stamp is in the anchoring lifecycle.
    pub status: StampStatus,

    /// The external ledger the batch was anchored to, once anchored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,

    /// The `AnchorRecord` covering this stamp's batch, once anchored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<Uuid>,

    /// The batch's Merkle root, once anchored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,

    /// Sibling path from this stamp's leaf to `merkle_root`, once anchored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_proof: Option<MerkleProof>,

    /// Ingestion time (UTC).
    pub created_at: DateTime<Utc>,

    /// When the stamp transitioned to `anchored`, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchored_at: Option<DateTime<Utc>>,
}

/// The ingestion request accepted by the service facade.
///
/// Content-hash format and event type are validated before anything touches
/// the ledger, so malformed requests never produce ledger entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStampRequest {
    pub agent_id: String,
    pub event_type: EventType,
    pub content_hash: String,
    pub framework: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Aggregate record for one agent, maintained by the service at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub framework: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub stamp_count: u64,
}
