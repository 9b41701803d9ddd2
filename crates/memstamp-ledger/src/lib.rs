//! # memstamp-ledger
//!
//! Append-only, per-agent, SHA-256 hash-chained event ledger.
//!
//! Every appended event links to its predecessor via `previous_hash`,
//! forming one tamper-evident chain per agent.  Mutating any historical
//! event — even a single byte — breaks the chain, which `verify_chain`
//! detects.
//!
//! Appends for the same agent are serialized (per-agent critical section);
//! different agents append concurrently.

pub mod chain;
pub mod memory;

pub use chain::{hash_for_event, verify_chain};
pub use memory::InMemoryLedger;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use memstamp_contracts::{CreateStampRequest, EventType, MemstampError};
    use memstamp_core::hash::{compute_hash, GENESIS_HASH};

    use super::{verify_chain, InMemoryLedger};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Build an ingestion request with a distinguishable payload hash.
    fn request(agent_id: &str, payload: &str) -> CreateStampRequest {
        CreateStampRequest {
            agent_id: agent_id.to_string(),
            event_type: EventType::Decision,
            content_hash: compute_hash(&json!({ "text": payload })),
            framework: "langchain".to_string(),
            signature: None,
            metadata: None,
        }
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Sequential appends yield a chain where each event's `previous_hash`
    /// equals the predecessor's own hash, starting from genesis.
    #[test]
    fn sequential_appends_link_correctly() {
        let ledger = InMemoryLedger::new();
        ledger.append(&request("agt-1", "first")).unwrap();
        ledger.append(&request("agt-1", "second")).unwrap();
        ledger.append(&request("agt-1", "third")).unwrap();

        let events = ledger.get_chain("agt-1").unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].previous_hash, GENESIS_HASH);
        assert_eq!(events[1].previous_hash, events[0].event_hash);
        assert_eq!(events[2].previous_hash, events[1].event_hash);

        assert!(verify_chain(&events), "untampered chain must verify");
    }

    /// Mutating any historical event invalidates the chain.
    #[test]
    fn tamper_detection() {
        let ledger = InMemoryLedger::new();
        ledger.append(&request("agt-t", "a")).unwrap();
        ledger.append(&request("agt-t", "b")).unwrap();
        ledger.append(&request("agt-t", "c")).unwrap();

        let mut events = ledger.get_chain("agt-t").unwrap();
        events[0].content_hash = compute_hash(&json!({ "text": "TAMPERED" }));

        assert!(
            !verify_chain(&events),
            "chain must detect a mutated historical event"
        );
    }

    /// Re-linking after tampering still fails: the forged event's stored
    /// hash no longer matches its recomputed value downstream.
    #[test]
    fn tampered_link_cannot_be_patched() {
        let ledger = InMemoryLedger::new();
        ledger.append(&request("agt-p", "a")).unwrap();
        ledger.append(&request("agt-p", "b")).unwrap();

        let mut events = ledger.get_chain("agt-p").unwrap();
        // Forge event 0 and "fix" event 1's back-link to the forged hash.
        events[0].content_hash = compute_hash(&json!({ "text": "forged" }));
        events[1].previous_hash = events[0].event_hash.clone();

        assert!(!verify_chain(&events));
    }

    #[test]
    fn distinct_agents_have_independent_chains() {
        let ledger = InMemoryLedger::new();
        ledger.append(&request("agt-a", "x")).unwrap();
        ledger.append(&request("agt-b", "y")).unwrap();
        ledger.append(&request("agt-a", "z")).unwrap();

        let chain_a = ledger.get_chain("agt-a").unwrap();
        let chain_b = ledger.get_chain("agt-b").unwrap();

        assert_eq!(chain_a.len(), 2);
        assert_eq!(chain_b.len(), 1);
        // Both chains start from genesis independently.
        assert_eq!(chain_a[0].previous_hash, GENESIS_HASH);
        assert_eq!(chain_b[0].previous_hash, GENESIS_HASH);
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let ledger = InMemoryLedger::new();
        let err = ledger.get_chain("agt-never").unwrap_err();
        assert!(matches!(err, MemstampError::UnknownAgent { .. }));
    }

    #[test]
    fn malformed_content_hash_never_reaches_the_chain() {
        let ledger = InMemoryLedger::new();
        let mut req = request("agt-bad", "x");
        req.content_hash = "sha256:tooshort".to_string();

        let err = ledger.append(&req).unwrap_err();
        assert!(matches!(err, MemstampError::InvalidContentHash { .. }));
        // The failed append must not have created the agent's chain.
        assert!(!ledger.has_agent("agt-bad"));
    }

    #[test]
    fn snapshot_until_returns_consistent_prefix() {
        let ledger = InMemoryLedger::new();
        ledger.append(&request("agt-s", "one")).unwrap();
        let middle = ledger.append(&request("agt-s", "two")).unwrap();
        ledger.append(&request("agt-s", "three")).unwrap();

        let prefix = ledger.snapshot_until("agt-s", &middle.event_id).unwrap();
        assert_eq!(prefix.len(), 2);
        assert_eq!(prefix[1].event_id, middle.event_id);
        assert!(verify_chain(&prefix), "every prefix of a valid chain is valid");
    }

    #[test]
    fn snapshot_until_unknown_event_is_an_error() {
        let ledger = InMemoryLedger::new();
        ledger.append(&request("agt-u", "only")).unwrap();

        let err = ledger
            .snapshot_until("agt-u", &uuid::Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, MemstampError::UnknownEvent { .. }));
    }

    /// A signature attached after ingestion never perturbs the chain —
    /// the event hash does not cover it.
    #[test]
    fn attaching_a_signature_keeps_the_chain_valid() {
        let ledger = InMemoryLedger::new();
        let event = ledger.append(&request("agt-sig", "signed later")).unwrap();
        ledger.append(&request("agt-sig", "successor")).unwrap();

        ledger
            .attach_signature("agt-sig", &event.event_id, "ab".repeat(64).as_str())
            .unwrap();

        let events = ledger.get_chain("agt-sig").unwrap();
        assert!(events[0].signature.is_some());
        assert!(verify_chain(&events));
    }

    #[test]
    fn attaching_to_unknown_event_is_an_error() {
        let ledger = InMemoryLedger::new();
        ledger.append(&request("agt-sig", "only")).unwrap();

        let err = ledger
            .attach_signature("agt-sig", &uuid::Uuid::new_v4(), "00")
            .unwrap_err();
        assert!(matches!(err, MemstampError::UnknownEvent { .. }));
    }

    /// Concurrent appends across many threads never produce duplicate
    /// predecessors: the per-agent critical section serializes the tail.
    #[test]
    fn concurrent_appends_serialize_per_agent() {
        use std::sync::Arc;

        let ledger = Arc::new(InMemoryLedger::new());
        let mut handles = Vec::new();

        for thread in 0..4 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    let payload = format!("t{}-{}", thread, i);
                    ledger.append(&request("agt-race", &payload)).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let events = ledger.get_chain("agt-race").unwrap();
        assert_eq!(events.len(), 100);
        assert!(
            verify_chain(&events),
            "interleaved appends must still form one valid chain"
        );
    }
}
