//! Anchor publication: idempotent publish, retrying submission, and
//! confirmation polling.
//!
//! The publisher owns every `AnchorRecord` and the chain adapters keyed by
//! their `chain` value.  Submission and polling are tick-driven: the
//! service calls `run_submit_cycle` / `poll_confirmations` periodically
//! with an injected `now`, and each cycle performs only the work that is
//! due.  Adapter calls happen outside the state lock, so a slow chain
//! never blocks `publish` or record reads.  Cycles may overlap: each
//! record is claimed under the lock before its adapter call, so two
//! concurrent cycles never submit or poll the same anchor twice.
//!
//! Failure policy: transient and rejected submissions alike are retried
//! with exponential backoff up to the configured attempt cap; exhaustion
//! marks the record `failed` and returns it to the caller, which re-batches
//! the underlying stamps.  A failed anchor is never silently dropped.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use memstamp_contracts::{AnchorRecord, AnchorStatus, MemstampError, MemstampResult};
use memstamp_core::{config::EngineConfig, traits::ChainAdapter};

use crate::batcher::Batch;

// ── Internal state ────────────────────────────────────────────────────────────

struct RetryState {
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
}

struct PublisherState {
    anchors: HashMap<Uuid, AnchorRecord>,
    /// Idempotency index: batch id → anchor id.
    by_batch: HashMap<Uuid, Uuid>,
    /// Submission backoff bookkeeping for pending anchors.
    retry: HashMap<Uuid, RetryState>,
    /// Anchors a cycle is actively working on.  Claimed under the lock
    /// before the adapter call, so overlapping cycles skip them.
    in_flight: HashSet<Uuid>,
}

// ── Publisher ─────────────────────────────────────────────────────────────────

/// Publishes Merkle roots to external ledgers and tracks confirmation.
pub struct AnchorPublisher {
    config: EngineConfig,
    adapters: HashMap<String, Arc<dyn ChainAdapter>>,
    state: Mutex<PublisherState>,
}

impl AnchorPublisher {
    /// Create a publisher over the given chain adapters.
    ///
    /// Adapters are keyed by their `chain()` value; an anchor whose chain
    /// has no registered adapter fails at submission time.
    pub fn new(config: EngineConfig, adapters: Vec<Arc<dyn ChainAdapter>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|a| (a.chain().to_string(), a))
            .collect();
        Self {
            config,
            adapters,
            state: Mutex::new(PublisherState {
                anchors: HashMap::new(),
                by_batch: HashMap::new(),
                retry: HashMap::new(),
                in_flight: HashSet::new(),
            }),
        }
    }

    /// The adapter serving `chain`, if one is registered.
    pub fn adapter_for(&self, chain: &str) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters.get(chain).cloned()
    }

    /// Create a pending anchor record for a closed batch.
    ///
    /// Idempotent on `batch.batch_id`: publishing the same batch twice
    /// returns the existing record instead of creating a second one, so a
    /// root is never double-submitted.
    pub fn publish(
        &self,
        batch: &Batch,
        merkle_root: &str,
        chain: &str,
        now: DateTime<Utc>,
    ) -> MemstampResult<AnchorRecord> {
        let mut state = self.state.lock().expect("publisher state lock poisoned");

        if let Some(anchor_id) = state.by_batch.get(&batch.batch_id) {
            let existing = state
                .anchors
                .get(anchor_id)
                .cloned()
                .ok_or_else(|| MemstampError::LedgerPoisoned {
                    reason: format!("batch index points at missing anchor {}", anchor_id),
                })?;
            return Ok(existing);
        }

        let record = AnchorRecord {
            id: Uuid::new_v4(),
            batch_id: batch.batch_id,
            merkle_root: merkle_root.to_string(),
            event_count: batch.stamp_ids.len() as u64,
            start_time: batch.opened_at,
            end_time: batch.closed_at,
            chain: chain.to_string(),
            tx_hash: None,
            block_number: None,
            confirmations: 0,
            status: AnchorStatus::Pending,
            created_at: now,
            confirmed_at: None,
            last_error: None,
        };

        info!(
            anchor_id = %record.id,
            batch_id = %record.batch_id,
            merkle_root = %record.merkle_root,
            event_count = record.event_count,
            chain = %record.chain,
            "anchor record created"
        );

        state.by_batch.insert(batch.batch_id, record.id);
        state.retry.insert(
            record.id,
            RetryState {
                attempts: 0,
                next_attempt_at: now,
            },
        );
        state.anchors.insert(record.id, record.clone());
        Ok(record)
    }

    /// Submit every due pending anchor to its chain adapter.
    ///
    /// Returns the records that reached terminal failure during this
    /// cycle — the caller must re-batch their stamps.
    pub fn run_submit_cycle(&self, now: DateTime<Utc>) -> Vec<AnchorRecord> {
        // Snapshot the due work so adapter calls run without the lock.
        // Each snapshotted record is claimed before the lock drops; a
        // cycle overlapping this one finds nothing due for it.
        let due: Vec<(Uuid, String, String, u64)> = {
            let mut guard = self.state.lock().expect("publisher state lock poisoned");
            let state = &mut *guard;
            let due: Vec<(Uuid, String, String, u64)> = state
                .anchors
                .values()
                .filter(|record| record.status == AnchorStatus::Pending)
                .filter(|record| !state.in_flight.contains(&record.id))
                .filter(|record| {
                    state
                        .retry
                        .get(&record.id)
                        .map(|r| r.next_attempt_at <= now)
                        .unwrap_or(true)
                })
                .map(|record| {
                    (
                        record.id,
                        record.merkle_root.clone(),
                        record.chain.clone(),
                        record.event_count,
                    )
                })
                .collect();
            for (anchor_id, ..) in &due {
                state.in_flight.insert(*anchor_id);
            }
            due
        };

        let mut failed = Vec::new();

        for (anchor_id, merkle_root, chain, event_count) in due {
            let outcome = match self.adapters.get(&chain) {
                Some(adapter) => {
                    let memo = serde_json::json!({
                        "protocol": "memstamp/v1",
                        "merkle_root": merkle_root,
                        "event_count": event_count,
                    })
                    .to_string();
                    adapter.submit(&merkle_root, &memo, self.config.adapter_timeout())
                }
                None => Err(MemstampError::ChainAdapterRejected {
                    chain: chain.clone(),
                    reason: format!("no adapter registered for chain '{}'", chain),
                }),
            };

            let mut guard = self.state.lock().expect("publisher state lock poisoned");
            let state = &mut *guard;
            state.in_flight.remove(&anchor_id);
            let Some(record) = state.anchors.get_mut(&anchor_id) else {
                continue;
            };

            match outcome {
                Ok(tx) => {
                    info!(
                        anchor_id = %anchor_id,
                        tx_hash = %tx.tx_hash,
                        chain = %chain,
                        "anchor submitted"
                    );
                    record.tx_hash = Some(tx.tx_hash);
                    record.status = AnchorStatus::Submitted;
                    record.last_error = None;
                    state.retry.remove(&anchor_id);
                }
                Err(e) => {
                    record.last_error = Some(e.to_string());
                    let retry = state.retry.entry(anchor_id).or_insert(RetryState {
                        attempts: 0,
                        next_attempt_at: now,
                    });
                    retry.attempts += 1;
                    let attempts = retry.attempts;

                    if attempts >= self.config.retry_max_attempts {
                        warn!(
                            anchor_id = %anchor_id,
                            attempts,
                            error = %e,
                            "anchor submission exhausted retries, marking failed"
                        );
                        record.status = AnchorStatus::Failed;
                        failed.push(record.clone());
                        state.retry.remove(&anchor_id);
                    } else {
                        let delay = self.config.retry_delay(attempts - 1);
                        retry.next_attempt_at =
                            now + chrono::Duration::milliseconds(delay.as_millis() as i64);
                        warn!(
                            anchor_id = %anchor_id,
                            attempt = attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "anchor submission failed, will retry"
                        );
                    }
                }
            }
        }

        failed
    }

    /// Poll the chain for every submitted-but-not-final anchor.
    ///
    /// Advances `submitted → confirmed` on block inclusion and
    /// `confirmed → finalized` once confirmations reach the configured
    /// threshold.  An unreachable adapter leaves status untouched (polled
    /// again next cycle); a transaction the chain no longer knows — a
    /// reorg — marks the anchor failed.  Returns newly failed records.
    pub fn poll_confirmations(&self, now: DateTime<Utc>) -> Vec<AnchorRecord> {
        // Claimed-before-release, like the submit cycle: overlapping poll
        // cycles never double-report one anchor's failure.
        let awaiting: Vec<(Uuid, String, String)> = {
            let mut guard = self.state.lock().expect("publisher state lock poisoned");
            let state = &mut *guard;
            let awaiting: Vec<(Uuid, String, String)> = state
                .anchors
                .values()
                .filter(|record| record.status.is_awaiting_finality())
                .filter(|record| !state.in_flight.contains(&record.id))
                .filter_map(|record| {
                    record
                        .tx_hash
                        .as_ref()
                        .map(|tx| (record.id, record.chain.clone(), tx.clone()))
                })
                .collect();
            for (anchor_id, ..) in &awaiting {
                state.in_flight.insert(*anchor_id);
            }
            awaiting
        };

        let mut failed = Vec::new();

        for (anchor_id, chain, tx_hash) in awaiting {
            let outcome = self
                .adapters
                .get(&chain)
                .map(|adapter| adapter.get_confirmation(&tx_hash, self.config.adapter_timeout()));

            let mut guard = self.state.lock().expect("publisher state lock poisoned");
            let state = &mut *guard;
            state.in_flight.remove(&anchor_id);
            let Some(outcome) = outcome else {
                continue;
            };
            let Some(record) = state.anchors.get_mut(&anchor_id) else {
                continue;
            };

            match outcome {
                Ok(confirmation) => {
                    record.confirmations = confirmation.confirmations;
                    if let Some(block) = confirmation.block_number {
                        record.block_number = Some(block);
                        if record.confirmed_at.is_none() {
                            record.confirmed_at = Some(now);
                        }
                        record.status = if confirmation.confirmations
                            >= self.config.finality_threshold
                        {
                            AnchorStatus::Finalized
                        } else {
                            AnchorStatus::Confirmed
                        };
                    }
                }
                Err(e @ MemstampError::ChainAdapterRejected { .. }) => {
                    warn!(
                        anchor_id = %anchor_id,
                        tx_hash = %tx_hash,
                        error = %e,
                        "anchor transaction no longer on chain, marking failed"
                    );
                    record.status = AnchorStatus::Failed;
                    record.last_error = Some(e.to_string());
                    failed.push(record.clone());
                }
                Err(e) => {
                    warn!(
                        anchor_id = %anchor_id,
                        error = %e,
                        "confirmation poll failed, will retry next cycle"
                    );
                }
            }
        }

        failed
    }

    /// Look up one anchor record.
    pub fn get(&self, anchor_id: &Uuid) -> Option<AnchorRecord> {
        let state = self.state.lock().expect("publisher state lock poisoned");
        state.anchors.get(anchor_id).cloned()
    }

    /// All anchor records, for operator inspection.
    pub fn anchors(&self) -> Vec<AnchorRecord> {
        let state = self.state.lock().expect("publisher state lock poisoned");
        state.anchors.values().cloned().collect()
    }
}
