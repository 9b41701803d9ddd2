//! Stamp and agent-record storage.
//!
//! The store is the engine's single source of truth for stamp lifecycle
//! state.  The ledger owns the immutable events; the store owns the
//! mutable wrapper around each one — status, anchor linkage, Merkle
//! proof — plus the per-agent aggregates maintained at ingestion.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use memstamp_contracts::{
    AgentRecord, AnchorRecord, Event, MemstampError, MemstampResult, MerkleProof, Stamp,
    StampStatus,
};

struct StoreState {
    stamps: HashMap<Uuid, Stamp>,
    /// Per-agent stamp ids in ingestion order, for listing.
    agent_order: HashMap<String, Vec<Uuid>>,
    /// Anchor id → the stamps its batch covered, in leaf order.
    by_anchor: HashMap<Uuid, Vec<Uuid>>,
    agents: HashMap<String, AgentRecord>,
}

/// In-memory stamp store with per-agent ordering and anchor indexing.
pub struct StampStore {
    state: RwLock<StoreState>,
}

impl StampStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                stamps: HashMap::new(),
                agent_order: HashMap::new(),
                by_anchor: HashMap::new(),
                agents: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> MemstampResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("stamp store lock poisoned: {}", e),
        })
    }

    fn write(&self) -> MemstampResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("stamp store lock poisoned: {}", e),
        })
    }

    /// Record a freshly ingested stamp and update its agent's aggregates.
    pub fn insert(&self, event: &Event, now: DateTime<Utc>) -> MemstampResult<Stamp> {
        let stamp = Stamp {
            id: Uuid::new_v4(),
            event: event.clone(),
            status: StampStatus::Pending,
            chain: None,
            anchor_id: None,
            merkle_root: None,
            merkle_proof: None,
            created_at: now,
            anchored_at: None,
        };

        let mut state = self.write()?;
        state
            .agent_order
            .entry(event.agent_id.clone())
            .or_default()
            .push(stamp.id);
        state
            .agents
            .entry(event.agent_id.clone())
            .and_modify(|record| {
                record.last_seen = now;
                record.stamp_count += 1;
            })
            .or_insert_with(|| AgentRecord {
                agent_id: event.agent_id.clone(),
                framework: event.framework.clone(),
                first_seen: now,
                last_seen: now,
                stamp_count: 1,
            });
        state.stamps.insert(stamp.id, stamp.clone());
        Ok(stamp)
    }

    /// Look up one stamp.
    ///
    /// # Errors
    ///
    /// `UnknownStamp` if no stamp exists under the id.
    pub fn get(&self, stamp_id: &Uuid) -> MemstampResult<Stamp> {
        let state = self.read()?;
        state
            .stamps
            .get(stamp_id)
            .cloned()
            .ok_or_else(|| MemstampError::UnknownStamp {
                stamp_id: stamp_id.to_string(),
            })
    }

    /// One agent's stamps in ingestion order, windowed by offset/limit.
    ///
    /// # Errors
    ///
    /// `UnknownAgent` if the agent has never created a stamp.
    pub fn list_agent(
        &self,
        agent_id: &str,
        offset: usize,
        limit: usize,
    ) -> MemstampResult<Vec<Stamp>> {
        let state = self.read()?;
        let order = state
            .agent_order
            .get(agent_id)
            .ok_or_else(|| MemstampError::UnknownAgent {
                agent_id: agent_id.to_string(),
            })?;
        Ok(order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| state.stamps.get(id).cloned())
            .collect())
    }

    /// Flip a stamp to `anchored`, attaching its anchor linkage and proof.
    pub fn mark_anchored(
        &self,
        stamp_id: &Uuid,
        anchor: &AnchorRecord,
        proof: MerkleProof,
        now: DateTime<Utc>,
    ) -> MemstampResult<()> {
        let mut state = self.write()?;
        let stamp = state
            .stamps
            .get_mut(stamp_id)
            .ok_or_else(|| MemstampError::UnknownStamp {
                stamp_id: stamp_id.to_string(),
            })?;
        stamp.status = StampStatus::Anchored;
        stamp.chain = Some(anchor.chain.clone());
        stamp.anchor_id = Some(anchor.id);
        stamp.merkle_root = Some(anchor.merkle_root.clone());
        stamp.merkle_proof = Some(proof);
        stamp.anchored_at = Some(now);
        state.by_anchor.entry(anchor.id).or_default().push(*stamp_id);
        Ok(())
    }

    /// Return an anchored stamp to `pending`, clearing its anchor linkage.
    ///
    /// Used when the covering anchor fails terminally and the stamp must
    /// join a fresh batch under a new Merkle root.
    pub fn reset_to_pending(&self, stamp_id: &Uuid) -> MemstampResult<()> {
        let mut state = self.write()?;
        let stamp = state
            .stamps
            .get_mut(stamp_id)
            .ok_or_else(|| MemstampError::UnknownStamp {
                stamp_id: stamp_id.to_string(),
            })?;
        debug!(stamp_id = %stamp_id, "stamp reset to pending for re-batching");
        stamp.status = StampStatus::Pending;
        stamp.chain = None;
        stamp.anchor_id = None;
        stamp.merkle_root = None;
        stamp.merkle_proof = None;
        stamp.anchored_at = None;
        Ok(())
    }

    /// Mirror a post-ingestion signature onto the stamp's event copy.
    pub fn attach_signature(&self, stamp_id: &Uuid, signature: &str) -> MemstampResult<()> {
        let mut state = self.write()?;
        let stamp = state
            .stamps
            .get_mut(stamp_id)
            .ok_or_else(|| MemstampError::UnknownStamp {
                stamp_id: stamp_id.to_string(),
            })?;
        stamp.event.signature = Some(signature.to_string());
        Ok(())
    }

    /// Record a successful verification against an anchored stamp.
    pub fn set_verified(&self, stamp_id: &Uuid) -> MemstampResult<()> {
        let mut state = self.write()?;
        let stamp = state
            .stamps
            .get_mut(stamp_id)
            .ok_or_else(|| MemstampError::UnknownStamp {
                stamp_id: stamp_id.to_string(),
            })?;
        if stamp.status == StampStatus::Anchored {
            stamp.status = StampStatus::Verified;
        }
        Ok(())
    }

    /// The stamp ids an anchor's batch covered, in leaf order.
    pub fn stamps_for_anchor(&self, anchor_id: &Uuid) -> MemstampResult<Vec<Uuid>> {
        let state = self.read()?;
        Ok(state.by_anchor.get(anchor_id).cloned().unwrap_or_default())
    }

    /// The aggregate record for one agent, if it has any stamps.
    pub fn agent(&self, agent_id: &str) -> MemstampResult<Option<AgentRecord>> {
        let state = self.read()?;
        Ok(state.agents.get(agent_id).cloned())
    }

    /// All agent records, for operator inspection.
    pub fn agents(&self) -> MemstampResult<Vec<AgentRecord>> {
        let state = self.read()?;
        Ok(state.agents.values().cloned().collect())
    }
}

impl Default for StampStore {
    fn default() -> Self {
        Self::new()
    }
}
