//! Hash-chain integrity: event-hash recomputation and chain verification.
//!
//! Every field that contributes to an event's hash is listed explicitly in
//! `memstamp_core::hash::compute_event_hash` so nothing is accidentally
//! omitted.  The chain links on `event_hash`, which itself commits to
//! `previous_hash` — mutating any historical field breaks every later link.

use memstamp_contracts::Event;
use memstamp_core::hash::{compute_event_hash, format_timestamp, GENESIS_HASH};

/// Recompute the hash an event should carry, from its own fields.
///
/// Returns a `sha256:`-prefixed lowercase hex string.  Matches the stored
/// `event_hash` for any untampered event.
pub fn hash_for_event(event: &Event) -> String {
    compute_event_hash(
        &event.event_id.to_string(),
        event.event_type.as_str(),
        &format_timestamp(&event.timestamp),
        &event.agent_id,
        &event.content_hash,
        &event.previous_hash,
    )
}

/// Verify the integrity of one agent's chain (or any prefix of it).
///
/// Returns `true` when both rules hold for every event:
///
/// 1. **Linkage** — `previous_hash` equals the predecessor's `event_hash`
///    (or `GENESIS_HASH` for the first event).
/// 2. **Correctness** — the stored `event_hash` matches the value
///    recomputed from the event's own fields.
///
/// Returns `false` at the first mismatch.  An empty chain is valid.
pub fn verify_chain(events: &[Event]) -> bool {
    let mut expected_prev = GENESIS_HASH.to_string();

    for event in events {
        if event.previous_hash != expected_prev {
            return false;
        }

        let recomputed = hash_for_event(event);
        if event.event_hash != recomputed {
            return false;
        }

        expected_prev = event.event_hash.clone();
    }

    true
}
