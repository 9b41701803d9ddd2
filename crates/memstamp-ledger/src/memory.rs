//! In-memory hash-chain ledger.
//!
//! `InMemoryLedger` owns the per-agent "last hash" state exclusively: no
//! other component reads or writes an agent's tail.  Appends for one agent
//! are serialized through that agent's own mutex, so no two concurrent
//! appends can observe the same predecessor; appends for different agents
//! proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use memstamp_contracts::{
    CreateStampRequest, Event, MemstampError, MemstampResult,
};
use memstamp_core::hash::{is_valid_content_hash, GENESIS_HASH};

use crate::chain::hash_for_event;

// ── Per-agent chain state ─────────────────────────────────────────────────────

/// One agent's chain: the append-ordered events plus the cached tail hash.
///
/// `last_hash` is `GENESIS_HASH` before the first append, and thereafter
/// always the `event_hash` of the newest event.
struct AgentChain {
    events: Vec<Event>,
    last_hash: String,
}

impl AgentChain {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            last_hash: GENESIS_HASH.to_string(),
        }
    }
}

// ── Ledger ────────────────────────────────────────────────────────────────────

/// The in-memory, append-only hash-chain ledger.
///
/// # Thread safety
///
/// The outer map is behind an `RwLock` taken only to locate (or create) an
/// agent's chain handle; the append critical section is the per-agent
/// `Mutex`.  Readers (`get_chain`, `snapshot_until`) take the same
/// per-agent lock, so they always observe a consistent chain — never one
/// that is mid-append.
pub struct InMemoryLedger {
    chains: RwLock<HashMap<String, Arc<Mutex<AgentChain>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Locate an existing chain handle without creating one.
    fn chain_handle(&self, agent_id: &str) -> MemstampResult<Arc<Mutex<AgentChain>>> {
        let chains = self.chains.read().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("chain map lock poisoned: {}", e),
        })?;
        chains
            .get(agent_id)
            .cloned()
            .ok_or_else(|| MemstampError::UnknownAgent {
                agent_id: agent_id.to_string(),
            })
    }

    /// Locate or create the chain handle for an agent.
    fn chain_handle_or_create(&self, agent_id: &str) -> MemstampResult<Arc<Mutex<AgentChain>>> {
        {
            let chains = self.chains.read().map_err(|e| MemstampError::LedgerPoisoned {
                reason: format!("chain map lock poisoned: {}", e),
            })?;
            if let Some(handle) = chains.get(agent_id) {
                return Ok(handle.clone());
            }
        }
        let mut chains = self.chains.write().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("chain map lock poisoned: {}", e),
        })?;
        Ok(chains
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(AgentChain::new())))
            .clone())
    }

    /// Append one event to an agent's chain.
    ///
    /// Validates the content-hash format first — a malformed hash never
    /// reaches the chain.  The tail read, event construction, and append
    /// happen inside the agent's critical section, so `previous_hash` is
    /// always the true predecessor.
    pub fn append(&self, request: &CreateStampRequest) -> MemstampResult<Event> {
        if !is_valid_content_hash(&request.content_hash) {
            return Err(MemstampError::InvalidContentHash {
                value: request.content_hash.clone(),
            });
        }

        let handle = self.chain_handle_or_create(&request.agent_id)?;
        let mut chain = handle.lock().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("chain for '{}' poisoned: {}", request.agent_id, e),
        })?;

        let mut event = Event {
            event_id: Uuid::new_v4(),
            agent_id: request.agent_id.clone(),
            event_type: request.event_type,
            content_hash: request.content_hash.clone(),
            previous_hash: chain.last_hash.clone(),
            event_hash: String::new(),
            timestamp: Utc::now(),
            framework: request.framework.clone(),
            signature: request.signature.clone(),
            metadata: request.metadata.clone(),
        };
        event.event_hash = hash_for_event(&event);

        chain.events.push(event.clone());
        chain.last_hash = event.event_hash.clone();

        debug!(
            agent_id = %event.agent_id,
            event_id = %event.event_id,
            sequence = chain.events.len(),
            "event appended to hash chain"
        );

        Ok(event)
    }

    /// All events for an agent, in append order.
    ///
    /// # Errors
    ///
    /// `UnknownAgent` if the agent has never appended.
    pub fn get_chain(&self, agent_id: &str) -> MemstampResult<Vec<Event>> {
        let handle = self.chain_handle(agent_id)?;
        let chain = handle.lock().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("chain for '{}' poisoned: {}", agent_id, e),
        })?;
        Ok(chain.events.clone())
    }

    /// A consistent chain prefix ending at (and including) `event_id`.
    ///
    /// Taken under the per-agent lock, so the snapshot never reflects a
    /// chain that is being appended mid-read.  This is what the verifier
    /// checks linkage against.
    pub fn snapshot_until(&self, agent_id: &str, event_id: &Uuid) -> MemstampResult<Vec<Event>> {
        let handle = self.chain_handle(agent_id)?;
        let chain = handle.lock().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("chain for '{}' poisoned: {}", agent_id, e),
        })?;

        match chain.events.iter().position(|e| &e.event_id == event_id) {
            Some(index) => Ok(chain.events[..=index].to_vec()),
            None => Err(MemstampError::UnknownEvent {
                event_id: event_id.to_string(),
            }),
        }
    }

    /// Attach a signature to an existing event.
    ///
    /// The event hash is fixed at append time and does not cover the
    /// signature, so attaching one later never perturbs the chain.  This
    /// is the intended flow: clients sign the ledger-assigned event hash
    /// after ingestion returns it.
    pub fn attach_signature(
        &self,
        agent_id: &str,
        event_id: &Uuid,
        signature: &str,
    ) -> MemstampResult<()> {
        let handle = self.chain_handle(agent_id)?;
        let mut chain = handle.lock().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("chain for '{}' poisoned: {}", agent_id, e),
        })?;

        match chain.events.iter_mut().find(|e| &e.event_id == event_id) {
            Some(event) => {
                event.signature = Some(signature.to_string());
                Ok(())
            }
            None => Err(MemstampError::UnknownEvent {
                event_id: event_id.to_string(),
            }),
        }
    }

    /// True once the agent has at least one event.
    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.chains
            .read()
            .map(|chains| chains.contains_key(agent_id))
            .unwrap_or(false)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}
