//! The stamp verifier.
//!
//! Verification runs four independent checks and reports all of them —
//! no short-circuiting — so a partial failure is diagnosable from a single
//! result:
//!
//! 1. **Hash chain** — the agent's chain prefix up to the event has intact
//!    linkage and correct recomputed hashes.
//! 2. **Merkle inclusion** — the stored proof reconstructs the anchored
//!    root from the stamp's content hash.
//! 3. **Chain confirmation** — the external ledger still reports the
//!    anchor transaction (detects reorgs).
//! 4. **Signature** — the event's Ed25519 signature validates against the
//!    agent's registered key.
//!
//! A check that cannot execute (unreachable adapter, elapsed timeout)
//! records its cause in `error` and leaves its boolean false.  The caller
//! never receives an `Err` from verification: "not verified" is an
//! expected outcome, not an exception.

use std::time::Duration;

use tracing::{debug, warn};

use memstamp_contracts::{
    AnchorRecord, AnchorStatus, Event, Stamp, VerificationResult,
};
use memstamp_core::merkle::verify_proof;
use memstamp_core::traits::{ChainAdapter, KeyRegistry};

/// Everything the verifier needs for one stamp.
///
/// The service collects these — a consistent chain snapshot, the anchor
/// record if any, and the external collaborators — so the verifier itself
/// stays free of storage knowledge.
pub struct VerifyInputs<'a> {
    /// The stamp being verified.
    pub stamp: &'a Stamp,

    /// Consistent snapshot of the agent's chain up to and including the
    /// stamp's event (see `InMemoryLedger::snapshot_until`).
    pub chain_events: &'a [Event],

    /// The anchor record covering the stamp's batch, once anchored.
    pub anchor: Option<&'a AnchorRecord>,

    /// The adapter for the anchor's chain, when one is registered.
    pub adapter: Option<&'a dyn ChainAdapter>,

    /// The key registry, when signature verification is configured.
    pub registry: Option<&'a dyn KeyRegistry>,

    /// Caller-supplied deadline for the external-chain query.
    pub timeout: Duration,
}

/// Run all four checks and aggregate the verdict.
///
/// `verified` is true only when every check required for the stamp's
/// current state passes: the hash chain always; Merkle inclusion once an
/// anchor exists; chain confirmation once the anchor has a transaction;
/// the signature whenever the event carries one.  Unsigned events are not
/// penalized for the absent signature.
pub fn verify(inputs: &VerifyInputs<'_>) -> VerificationResult {
    let stamp = inputs.stamp;
    let event = &stamp.event;
    let mut errors: Vec<String> = Vec::new();

    // ── Check 1: hash-chain linkage ───────────────────────────────────────
    let hash_chain_valid = match inputs.chain_events.last() {
        Some(last) if last.event_id == event.event_id => {
            let valid = memstamp_ledger::verify_chain(inputs.chain_events);
            if !valid {
                warn!(stamp_id = %stamp.id, agent_id = %event.agent_id, "hash chain verification failed");
                errors.push("hash chain linkage is broken".to_string());
            }
            valid
        }
        _ => {
            errors.push("event is not the tail of the supplied chain snapshot".to_string());
            false
        }
    };

    // ── Check 2: Merkle inclusion ─────────────────────────────────────────
    let merkle_included = match (&stamp.merkle_proof, inputs.anchor) {
        (Some(proof), Some(anchor)) => {
            if proof.leaf != event.content_hash {
                errors.push("merkle proof leaf does not match the stamp's content hash".to_string());
                false
            } else if proof.root != anchor.merkle_root {
                errors.push("merkle proof root does not match the anchored root".to_string());
                false
            } else if !verify_proof(proof) {
                warn!(stamp_id = %stamp.id, "merkle proof does not reconstruct its root");
                errors.push("merkle proof does not reconstruct the anchored root".to_string());
                false
            } else {
                true
            }
        }
        (Some(_), None) => {
            errors.push("stamp carries a merkle proof but its anchor record is missing".to_string());
            false
        }
        // Pending stamp: inclusion is simply not established yet.
        (None, _) => false,
    };

    // ── Check 3: external-chain confirmation ──────────────────────────────
    let chain_verified = match inputs.anchor {
        Some(anchor) if anchor.status == AnchorStatus::Failed => {
            errors.push(format!(
                "anchor {} failed: {}",
                anchor.id,
                anchor.last_error.as_deref().unwrap_or("unknown cause")
            ));
            false
        }
        Some(anchor) => match (&anchor.tx_hash, inputs.adapter) {
            (Some(tx_hash), Some(adapter)) => {
                match adapter.get_confirmation(tx_hash, inputs.timeout) {
                    Ok(confirmation) => match confirmation.block_number {
                        Some(block) => {
                            // A moved block number means the chain no longer
                            // matches what was recorded at confirmation time.
                            let consistent = anchor
                                .block_number
                                .map(|recorded| recorded == block)
                                .unwrap_or(true);
                            if !consistent {
                                errors.push(format!(
                                    "anchor transaction moved from block {} to {}",
                                    anchor.block_number.unwrap_or_default(),
                                    block
                                ));
                            }
                            consistent
                        }
                        None => {
                            errors.push("anchor transaction not yet included in a block".to_string());
                            false
                        }
                    },
                    Err(e) => {
                        warn!(stamp_id = %stamp.id, error = %e, "chain confirmation check could not execute");
                        errors.push(e.to_string());
                        false
                    }
                }
            }
            (Some(_), None) => {
                errors.push(format!("no chain adapter registered for '{}'", anchor.chain));
                false
            }
            // Anchor exists but has not been submitted yet: expected interim
            // state, not an error.
            (None, _) => false,
        },
        None => false,
    };

    // ── Check 4: signature ────────────────────────────────────────────────
    let signature_verified = match (&event.signature, inputs.registry) {
        (Some(signature), Some(registry)) => {
            match registry.verify_signature(&event.agent_id, &event.event_hash, signature) {
                Ok(true) => true,
                Ok(false) => {
                    errors.push("signature did not verify against the agent's registered key".to_string());
                    false
                }
                Err(e) => {
                    errors.push(e.to_string());
                    false
                }
            }
        }
        (Some(_), None) => {
            errors.push("event is signed but no key registry is configured".to_string());
            false
        }
        (None, _) => false,
    };

    // ── Aggregate verdict ─────────────────────────────────────────────────
    let mut verified = hash_chain_valid;
    if event.signature.is_some() {
        verified &= signature_verified;
    }
    if inputs.anchor.is_some() || stamp.merkle_proof.is_some() {
        verified &= merkle_included;
    }
    if let Some(anchor) = inputs.anchor {
        if anchor.status == AnchorStatus::Failed {
            verified = false;
        }
        if anchor.tx_hash.is_some() {
            verified &= chain_verified;
        }
    }

    debug!(
        stamp_id = %stamp.id,
        verified,
        hash_chain_valid,
        merkle_included,
        chain_verified,
        signature_verified,
        "stamp verification complete"
    );

    VerificationResult {
        verified,
        stamp_id: stamp.id,
        content_hash: event.content_hash.clone(),
        merkle_root: inputs
            .anchor
            .map(|a| a.merkle_root.clone())
            .or_else(|| stamp.merkle_root.clone()),
        anchor_tx: inputs.anchor.and_then(|a| a.tx_hash.clone()),
        chain: inputs.anchor.map(|a| a.chain.clone()),
        block_number: inputs.anchor.and_then(|a| a.block_number),
        hash_chain_valid,
        merkle_included,
        chain_verified,
        signature_verified,
        error: if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        },
    }
}
