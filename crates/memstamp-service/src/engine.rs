//! The engine facade.
//!
//! `MemstampEngine` wires the ledger, stamp store, batcher, publisher, and
//! verifier into the surface clients call: create a stamp, look one up,
//! list an agent's stamps, verify.  The anchoring pipeline is tick-driven —
//! a host calls `run_anchor_cycle` and `run_confirmation_cycle`
//! periodically with the current time, and each call performs only the
//! work that is due.
//!
//! Cycle calls are coalesced: a cycle arriving while another is mid-flight
//! returns immediately instead of queueing, so a slow chain adapter never
//! stacks up concurrent anchoring work.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use memstamp_anchor::{AnchorPublisher, Batch, Batcher, DeadlineAdapter};
use memstamp_contracts::{
    AgentRecord, AnchorRecord, CreateStampRequest, MemstampResult, Stamp, VerificationResult,
};
use memstamp_core::{
    config::EngineConfig,
    merkle::MerkleTree,
    traits::{ChainAdapter, KeyRegistry},
};
use memstamp_ledger::InMemoryLedger;
use memstamp_verify::{verify, VerifyInputs};

use crate::store::StampStore;

/// Page size applied when a listing request names none.
const DEFAULT_PAGE_LIMIT: usize = 50;
/// Hard cap on a single listing page.
const MAX_PAGE_LIMIT: usize = 1000;

/// The assembled anchoring engine.
pub struct MemstampEngine {
    config: EngineConfig,
    ledger: InMemoryLedger,
    store: StampStore,
    batcher: Batcher,
    publisher: AnchorPublisher,
    registry: Option<Arc<dyn KeyRegistry>>,
    /// Coalesces concurrent anchor cycles; held for the whole cycle.
    cycle_gate: Mutex<()>,
}

impl MemstampEngine {
    /// Assemble an engine over the given chain adapters.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the configuration fails validation.
    pub fn new(
        config: EngineConfig,
        adapters: Vec<Arc<dyn ChainAdapter>>,
    ) -> MemstampResult<Self> {
        config.validate()?;
        let batcher = Batcher::new(config.batch_max_size, config.batch_max_age());
        let publisher = AnchorPublisher::new(config.clone(), adapters);
        Ok(Self {
            config,
            ledger: InMemoryLedger::new(),
            store: StampStore::new(),
            batcher,
            publisher,
            registry: None,
            cycle_gate: Mutex::new(()),
        })
    }

    /// Attach a key registry; signed events are then checked at
    /// verification time.
    pub fn with_key_registry(mut self, registry: Arc<dyn KeyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    // ── Ingestion and lookup ──────────────────────────────────────────────────

    /// Ingest one event: append to the agent's hash chain, record the
    /// stamp, and enqueue it for the next anchor batch.
    ///
    /// Validation happens inside the ledger append — a malformed content
    /// hash produces neither a ledger event nor a stamp.
    pub fn create_stamp(
        &self,
        request: &CreateStampRequest,
        now: DateTime<Utc>,
    ) -> MemstampResult<Stamp> {
        let event = self.ledger.append(request)?;
        let stamp = self.store.insert(&event, now)?;
        self.batcher.enqueue(stamp.id, now);

        info!(
            stamp_id = %stamp.id,
            agent_id = %event.agent_id,
            event_type = %event.event_type,
            "stamp created"
        );
        Ok(stamp)
    }

    /// Look up one stamp by id.
    pub fn get_stamp(&self, stamp_id: &Uuid) -> MemstampResult<Stamp> {
        self.store.get(stamp_id)
    }

    /// Attach a client signature over the stamp's event hash.
    ///
    /// The event hash is only known once ingestion returns, so signing is
    /// a second step: create, sign the returned `event_hash`, attach.  The
    /// signature is checked against the agent's registered key at
    /// verification time.
    pub fn attach_signature(&self, stamp_id: &Uuid, signature: &str) -> MemstampResult<()> {
        let stamp = self.store.get(stamp_id)?;
        self.ledger
            .attach_signature(&stamp.event.agent_id, &stamp.event.event_id, signature)?;
        self.store.attach_signature(stamp_id, signature)
    }

    /// One agent's stamps in ingestion order.
    ///
    /// `limit` defaults to 50 and is clamped to `1..=1000`; `offset` skips
    /// from the front of the agent's history.
    pub fn list_agent_stamps(
        &self,
        agent_id: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> MemstampResult<Vec<Stamp>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        self.store.list_agent(agent_id, offset, limit)
    }

    /// The aggregate record for one agent, if it has any stamps.
    pub fn get_agent(&self, agent_id: &str) -> MemstampResult<Option<AgentRecord>> {
        self.store.agent(agent_id)
    }

    /// All agent records.
    pub fn list_agents(&self) -> MemstampResult<Vec<AgentRecord>> {
        self.store.agents()
    }

    /// Look up one anchor record.
    pub fn get_anchor(&self, anchor_id: &Uuid) -> Option<AnchorRecord> {
        self.publisher.get(anchor_id)
    }

    /// All anchor records.
    pub fn list_anchors(&self) -> Vec<AnchorRecord> {
        self.publisher.anchors()
    }

    /// Stamps waiting in the open batch.
    pub fn pending_batch_len(&self) -> usize {
        self.batcher.open_len()
    }

    // ── Anchoring cycles ──────────────────────────────────────────────────────

    /// Close due batches, publish their Merkle roots, and submit every due
    /// anchor.  Returns the anchors published during this cycle.
    ///
    /// If another cycle is already running the call returns empty without
    /// doing any work.
    pub fn run_anchor_cycle(&self, now: DateTime<Utc>) -> MemstampResult<Vec<AnchorRecord>> {
        let Ok(_gate) = self.cycle_gate.try_lock() else {
            return Ok(Vec::new());
        };

        let mut published = Vec::new();
        for batch in self.batcher.take_closed_batches(now) {
            published.push(self.anchor_batch(&batch, now)?);
        }

        self.run_publish_cycle(now)?;

        // Reflect post-submission state in the returned records.
        for record in &mut published {
            if let Some(fresh) = self.publisher.get(&record.id) {
                *record = fresh;
            }
        }
        Ok(published)
    }

    /// Submit every due pending anchor (retries included) and re-batch
    /// the stamps of anchors that exhausted their attempts.
    ///
    /// `run_anchor_cycle` calls this after closing batches; hosts may
    /// also call it on its own so retry backoff proceeds between batch
    /// closings.
    pub fn run_publish_cycle(&self, now: DateTime<Utc>) -> MemstampResult<()> {
        let failed = self.publisher.run_submit_cycle(now);
        self.requeue_failed(&failed, now)
    }

    /// Poll confirmations for every submitted anchor and re-batch the
    /// stamps of any anchor that failed (e.g. a reorged transaction).
    pub fn run_confirmation_cycle(&self, now: DateTime<Utc>) -> MemstampResult<()> {
        let failed = self.publisher.poll_confirmations(now);
        self.requeue_failed(&failed, now)
    }

    /// Publish one closed batch: build its Merkle tree over the stamps'
    /// content hashes in leaf order, create the anchor record, and attach
    /// each stamp's proof.
    fn anchor_batch(&self, batch: &Batch, now: DateTime<Utc>) -> MemstampResult<AnchorRecord> {
        let mut leaves = Vec::with_capacity(batch.stamp_ids.len());
        for stamp_id in &batch.stamp_ids {
            leaves.push(self.store.get(stamp_id)?.event.content_hash.clone());
        }
        let tree = MerkleTree::build(&leaves)?;

        let record = self
            .publisher
            .publish(batch, &tree.root(), &self.config.default_chain, now)?;

        for (index, stamp_id) in batch.stamp_ids.iter().enumerate() {
            // Index is in range: the tree was built over this batch.
            if let Some(proof) = tree.proof_for(index) {
                self.store.mark_anchored(stamp_id, &record, proof, now)?;
            }
        }

        info!(
            anchor_id = %record.id,
            batch_id = %batch.batch_id,
            stamps = batch.stamp_ids.len(),
            merkle_root = %record.merkle_root,
            "batch anchored"
        );
        Ok(record)
    }

    /// Return the stamps of terminally failed anchors to the batcher.
    ///
    /// The stamps re-enter in their original leaf order, so a retried
    /// batch of identical membership reproduces the same root.
    fn requeue_failed(
        &self,
        failed: &[AnchorRecord],
        now: DateTime<Utc>,
    ) -> MemstampResult<()> {
        for anchor in failed {
            let stamp_ids = self.store.stamps_for_anchor(&anchor.id)?;
            warn!(
                anchor_id = %anchor.id,
                stamps = stamp_ids.len(),
                error = anchor.last_error.as_deref().unwrap_or("unknown"),
                "anchor failed terminally, re-batching its stamps"
            );
            for stamp_id in stamp_ids {
                self.store.reset_to_pending(&stamp_id)?;
                self.batcher.enqueue(stamp_id, now);
            }
        }
        Ok(())
    }

    // ── Verification ──────────────────────────────────────────────────────────

    /// Verify one stamp, running every applicable check.
    ///
    /// `timeout` bounds the external-chain query; `None` uses the
    /// configured adapter deadline.  A successful verification of an
    /// anchored stamp flips its status to `verified`.
    pub fn verify_stamp(
        &self,
        stamp_id: &Uuid,
        timeout: Option<Duration>,
    ) -> MemstampResult<VerificationResult> {
        let stamp = self.store.get(stamp_id)?;
        let chain_events = self
            .ledger
            .snapshot_until(&stamp.event.agent_id, &stamp.event.event_id)?;

        let anchor = stamp.anchor_id.and_then(|id| self.publisher.get(&id));
        // Deadline-guarded: verification sits on the client path, so even
        // an adapter that ignores its timeout cannot stall the caller.
        let adapter = anchor
            .as_ref()
            .and_then(|a| self.publisher.adapter_for(&a.chain))
            .map(DeadlineAdapter::new);

        let result = verify(&VerifyInputs {
            stamp: &stamp,
            chain_events: &chain_events,
            anchor: anchor.as_ref(),
            adapter: adapter.as_ref().map(|a| a as &dyn ChainAdapter),
            registry: self.registry.as_deref(),
            timeout: timeout.unwrap_or_else(|| self.config.adapter_timeout()),
        });

        if result.verified {
            self.store.set_verified(stamp_id)?;
        }
        Ok(result)
    }
}
