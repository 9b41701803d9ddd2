//! Error taxonomy for the memstamp anchoring engine.
//!
//! All fallible operations across the engine crates return
//! `MemstampResult<T>`.  Variants carry enough context to tell an operator
//! which stamp, agent, or chain was involved without consulting logs.
//!
//! Two variants deserve special mention:
//!
//! - `ChainAdapterUnavailable` is retriable — the publisher backs off and
//!   tries again up to its attempt cap.
//! - `ProofMismatch` is never retried.  A proof that does not reconstruct
//!   its root is data corruption, not a transient fault.

use thiserror::Error;

/// The unified error type for the memstamp engine.
#[derive(Debug, Error)]
pub enum MemstampError {
    /// The queried agent has never appended an event to the ledger.
    #[error("unknown agent '{agent_id}'")]
    UnknownAgent { agent_id: String },

    /// No stamp exists under the given id.
    #[error("unknown stamp '{stamp_id}'")]
    UnknownStamp { stamp_id: String },

    /// No ledger event exists under the given event id.
    #[error("unknown event '{event_id}'")]
    UnknownEvent { event_id: String },

    /// A content hash did not match the required `sha256:` + 64 lowercase
    /// hex format.  Rejected at ingestion, before any ledger mutation.
    #[error("invalid content hash '{value}': expected \"sha256:\" followed by 64 lowercase hex chars")]
    InvalidContentHash { value: String },

    /// The external chain adapter could not be reached.  Retriable.
    #[error("chain adapter for '{chain}' unavailable: {reason}")]
    ChainAdapterUnavailable { chain: String, reason: String },

    /// The external chain rejected the submission.  Terminal once the
    /// retry cap is exhausted.
    #[error("chain adapter for '{chain}' rejected submission: {reason}")]
    ChainAdapterRejected { chain: String, reason: String },

    /// A stored Merkle proof failed to reconstruct its anchor root.
    #[error("merkle proof for stamp '{stamp_id}' does not reconstruct the anchored root")]
    ProofMismatch { stamp_id: String },

    /// A caller-supplied deadline elapsed before the operation completed.
    #[error("operation '{operation}' timed out")]
    Timeout { operation: String },

    /// A Merkle tree cannot be built over zero leaves.
    #[error("cannot build a merkle tree over an empty batch")]
    EmptyBatch,

    /// A required configuration value is missing or malformed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// Internal ledger state was corrupted (e.g. a poisoned lock).
    #[error("ledger state error: {reason}")]
    LedgerPoisoned { reason: String },

    /// A signature or public key could not be decoded.
    #[error("signature error: {reason}")]
    SignatureError { reason: String },
}

impl MemstampError {
    /// True for faults the publisher may retry with backoff.
    pub fn is_retriable(&self) -> bool {
        matches!(self, MemstampError::ChainAdapterUnavailable { .. })
    }
}

/// Convenience alias used throughout the memstamp crates.
pub type MemstampResult<T> = Result<T, MemstampError>;
