//! VCOT event types — the attested unit of agent activity.
//!
//! An `Event` is one entry in a per-agent hash chain.  Its `previous_hash`
//! commits to the predecessor's `event_hash`, so mutating any historical
//! event invalidates every later link.  Events are immutable once created;
//! the ledger never updates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The VCOT schema version stamped onto every event.
pub const VCOT_VERSION: &str = "vcot/0.1";

/// The closed vocabulary of attestable agent event kinds.
///
/// Unknown kinds are rejected at ingestion — the ledger never contains an
/// event type outside this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Decision,
    ToolCall,
    ToolResult,
    MemoryWrite,
    MemoryRead,
    ExternalAction,
    StateChange,
    Observation,
    Custom,
}

impl EventType {
    /// The wire name of this event type, as it appears in event hashes.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Decision => "decision",
            EventType::ToolCall => "tool_call",
            EventType::ToolResult => "tool_result",
            EventType::MemoryWrite => "memory_write",
            EventType::MemoryRead => "memory_read",
            EventType::ExternalAction => "external_action",
            EventType::StateChange => "state_change",
            EventType::Observation => "observation",
            EventType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in an agent's hash chain.
///
/// `content_hash` fingerprints the attested content (computed by the client
/// over canonical JSON); `event_hash` commits to every identifying field of
/// the event itself, including `previous_hash`.  The chain links on
/// `event_hash`, so tampering with any field — not just the content — is
/// detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique id assigned by the ledger at append time.
    pub event_id: Uuid,

    /// The agent whose chain this event belongs to.
    pub agent_id: String,

    /// What kind of agent activity is being attested.
    pub event_type: EventType,

    /// `sha256:` + 64 lowercase hex fingerprint of the attested content.
    pub content_hash: String,

    /// The predecessor's `event_hash`, or the genesis sentinel for the
    /// first event of an agent.
    pub previous_hash: String,

    /// SHA-256 commitment over this event's identifying fields.
    ///
    /// Computed over the pipe-joined string
    /// `event_id|event_type|timestamp|agent_id|content_hash|previous_hash`.
    pub event_hash: String,

    /// Wall-clock append time (UTC).
    pub timestamp: DateTime<Utc>,

    /// The client framework that produced the event (e.g. "langchain").
    pub framework: String,

    /// Optional hex-encoded Ed25519 signature over `event_hash`, produced
    /// with the agent's registered key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Optional caller-supplied JSON metadata.  Opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
