//! Trust-boundary traits for external collaborators.
//!
//! Two capabilities live outside the engine core:
//!
//! - `ChainAdapter` — the actual blockchain client.  One implementation
//!   per supported external ledger, selected by an anchor's `chain` field.
//!   New chains are added by implementing this trait, never by branching
//!   on a type.
//! - `KeyRegistry` — resolves agent signing keys and validates event-hash
//!   signatures.
//!
//! Both traits take an explicit timeout on every potentially remote call.
//! Implementations must return within the deadline — `Timeout` or
//! `ChainAdapterUnavailable` — rather than blocking the caller.

use std::time::Duration;

use memstamp_contracts::MemstampResult;

/// Handle to a submitted anchor transaction on an external ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    pub tx_hash: String,
}

/// The confirmation state of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// The block the transaction landed in, once included.
    pub block_number: Option<u64>,
    /// Confirmations observed on top of that block.
    pub confirmations: u32,
}

/// A pluggable external-ledger integration.
///
/// # Errors
///
/// - `ChainAdapterUnavailable` for transient faults (network, RPC) — the
///   publisher retries these with backoff.
/// - `ChainAdapterRejected` when the ledger refused the transaction.
/// - `Timeout` when the supplied deadline elapsed.
pub trait ChainAdapter: Send + Sync {
    /// The `chain` value this adapter serves (e.g. "solana").
    fn chain(&self) -> &str;

    /// Submit a Merkle root to the external ledger.
    ///
    /// `metadata` is an opaque memo string recorded alongside the root.
    fn submit(
        &self,
        merkle_root: &str,
        metadata: &str,
        timeout: Duration,
    ) -> MemstampResult<TxHandle>;

    /// Query the current confirmation state of a submitted transaction.
    ///
    /// A transaction the ledger no longer knows (reorged away) reports
    /// `ChainAdapterRejected`.
    fn get_confirmation(&self, tx_hash: &str, timeout: Duration) -> MemstampResult<Confirmation>;
}

/// Resolves agent signing keys and validates event-hash signatures.
pub trait KeyRegistry: Send + Sync {
    /// Validate `signature` (hex) over `event_hash` for `agent_id`.
    ///
    /// Returns `Ok(false)` when the agent has no registered key or the
    /// signature does not verify; `Err` only for malformed inputs.
    fn verify_signature(
        &self,
        agent_id: &str,
        event_hash: &str,
        signature: &str,
    ) -> MemstampResult<bool>;
}
