//! # memstamp-anchor
//!
//! Batch accumulation and anchor publication for the memstamp engine.
//!
//! The `Batcher` groups pending stamps into batches on a size/age trigger;
//! the `AnchorPublisher` turns each closed batch's Merkle root into an
//! `AnchorRecord`, submits it through a pluggable `ChainAdapter`, and
//! drives the record through `pending → submitted → confirmed → finalized`
//! (or terminal `failed`, after which the stamps are re-batched).
//!
//! Also home to the in-process `MockChainAdapter`, the deadline-enforcing
//! `DeadlineAdapter`, and the Ed25519 `InMemoryKeyRegistry` used by tests
//! and the demo.

pub mod adapters;
pub mod batcher;
pub mod keys;
pub mod publisher;

pub use adapters::{DeadlineAdapter, MockChainAdapter};
pub use batcher::{Batch, Batcher};
pub use keys::{keypair_from_seed, sign_event_hash, InMemoryKeyRegistry};
pub use publisher::AnchorPublisher;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use memstamp_contracts::{AnchorStatus, MemstampError, MemstampResult};
    use memstamp_core::{
        config::EngineConfig,
        hash::compute_hash,
        traits::{ChainAdapter, Confirmation, TxHandle},
    };

    use super::{AnchorPublisher, Batch, DeadlineAdapter, MockChainAdapter};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()
    }

    fn batch(size: usize) -> Batch {
        Batch {
            batch_id: Uuid::new_v4(),
            stamp_ids: (0..size).map(|_| Uuid::new_v4()).collect(),
            opened_at: t0(),
            closed_at: t0(),
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            retry_base_delay_ms: 1000,
            retry_max_attempts: 3,
            finality_threshold: 2,
            ..EngineConfig::default()
        }
    }

    fn root() -> String {
        compute_hash(&json!({ "root": "of the batch" }))
    }

    fn publisher_with_adapter() -> (AnchorPublisher, Arc<MockChainAdapter>) {
        let adapter = Arc::new(MockChainAdapter::new("solana"));
        let publisher = AnchorPublisher::new(config(), vec![adapter.clone()]);
        (publisher, adapter)
    }

    /// An adapter whose `submit` blocks until released, for cycle-overlap
    /// tests.
    struct GatedAdapter {
        chain: String,
        entered: Mutex<u32>,
        entered_cv: Condvar,
        released: Mutex<bool>,
        released_cv: Condvar,
    }

    impl GatedAdapter {
        fn new(chain: impl Into<String>) -> Self {
            Self {
                chain: chain.into(),
                entered: Mutex::new(0),
                entered_cv: Condvar::new(),
                released: Mutex::new(false),
                released_cv: Condvar::new(),
            }
        }

        fn wait_until_entered(&self) {
            let mut entered = self.entered.lock().unwrap();
            while *entered == 0 {
                entered = self.entered_cv.wait(entered).unwrap();
            }
        }

        fn release(&self) {
            *self.released.lock().unwrap() = true;
            self.released_cv.notify_all();
        }

        fn entries(&self) -> u32 {
            *self.entered.lock().unwrap()
        }
    }

    impl ChainAdapter for GatedAdapter {
        fn chain(&self) -> &str {
            &self.chain
        }

        fn submit(
            &self,
            _merkle_root: &str,
            _metadata: &str,
            _timeout: Duration,
        ) -> MemstampResult<TxHandle> {
            let entry = {
                let mut entered = self.entered.lock().unwrap();
                *entered += 1;
                self.entered_cv.notify_all();
                *entered
            };
            let mut released = self.released.lock().unwrap();
            while !*released {
                released = self.released_cv.wait(released).unwrap();
            }
            Ok(TxHandle {
                tx_hash: format!("gated-tx-{}", entry),
            })
        }

        fn get_confirmation(
            &self,
            _tx_hash: &str,
            _timeout: Duration,
        ) -> MemstampResult<Confirmation> {
            Ok(Confirmation {
                block_number: None,
                confirmations: 0,
            })
        }
    }

    /// An adapter that ignores its deadline and never returns.
    struct HungAdapter {
        chain: String,
    }

    impl ChainAdapter for HungAdapter {
        fn chain(&self) -> &str {
            &self.chain
        }

        fn submit(
            &self,
            _merkle_root: &str,
            _metadata: &str,
            _timeout: Duration,
        ) -> MemstampResult<TxHandle> {
            loop {
                std::thread::park();
            }
        }

        fn get_confirmation(
            &self,
            _tx_hash: &str,
            _timeout: Duration,
        ) -> MemstampResult<Confirmation> {
            loop {
                std::thread::park();
            }
        }
    }

    // ── Publish ───────────────────────────────────────────────────────────────

    /// Publishing the same batch twice never creates two anchor records.
    #[test]
    fn publish_is_idempotent_per_batch() {
        let (publisher, _adapter) = publisher_with_adapter();
        let batch = batch(3);

        let first = publisher.publish(&batch, &root(), "solana", t0()).unwrap();
        let second = publisher.publish(&batch, &root(), "solana", t0()).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(publisher.anchors().len(), 1);
        assert_eq!(first.status, AnchorStatus::Pending);
        assert_eq!(first.event_count, 3);
    }

    /// A published root is submitted exactly once even across many cycles.
    #[test]
    fn submit_cycle_does_not_double_submit() {
        let (publisher, adapter) = publisher_with_adapter();
        let batch = batch(2);
        let record = publisher.publish(&batch, &root(), "solana", t0()).unwrap();

        publisher.run_submit_cycle(t0());
        publisher.run_submit_cycle(t0() + chrono::Duration::seconds(10));

        assert_eq!(adapter.submit_count(), 1);
        let record = publisher.get(&record.id).unwrap();
        assert_eq!(record.status, AnchorStatus::Submitted);
        assert!(record.tx_hash.is_some());
    }

    /// Overlapping submit cycles never double-submit one anchor: the
    /// record is claimed under the state lock before the adapter call, so
    /// a second cycle arriving mid-submission finds nothing due.
    #[test]
    fn concurrent_submit_cycles_submit_once() {
        let adapter = Arc::new(GatedAdapter::new("solana"));
        let publisher = Arc::new(AnchorPublisher::new(config(), vec![adapter.clone()]));
        let record = publisher.publish(&batch(1), &root(), "solana", t0()).unwrap();

        let background = {
            let publisher = publisher.clone();
            std::thread::spawn(move || publisher.run_submit_cycle(t0()))
        };
        adapter.wait_until_entered();

        // The first cycle is parked inside the adapter; a second cycle
        // must skip the claimed record instead of submitting it again.
        publisher.run_submit_cycle(t0());
        assert_eq!(adapter.entries(), 1);

        adapter.release();
        background.join().unwrap();

        assert_eq!(adapter.entries(), 1);
        let record = publisher.get(&record.id).unwrap();
        assert_eq!(record.status, AnchorStatus::Submitted);
        assert!(record.tx_hash.is_some());
    }

    // ── Retry / backoff ───────────────────────────────────────────────────────

    /// A transient fault is retried only after its backoff delay elapses.
    #[test]
    fn retry_waits_for_backoff() {
        let (publisher, adapter) = publisher_with_adapter();
        let batch = batch(1);
        let record = publisher.publish(&batch, &root(), "solana", t0()).unwrap();

        adapter.fail_next_submits(1);
        let failed = publisher.run_submit_cycle(t0());
        assert!(failed.is_empty(), "one fault is below the attempt cap");

        let after_fault = publisher.get(&record.id).unwrap();
        assert_eq!(after_fault.status, AnchorStatus::Pending);
        assert!(after_fault.last_error.is_some());

        // Too early: the 1 s base delay has not elapsed.
        publisher.run_submit_cycle(t0() + chrono::Duration::milliseconds(500));
        assert_eq!(adapter.submit_count(), 0);

        // Due: the retry goes through.
        publisher.run_submit_cycle(t0() + chrono::Duration::milliseconds(1500));
        assert_eq!(adapter.submit_count(), 1);
        assert_eq!(
            publisher.get(&record.id).unwrap().status,
            AnchorStatus::Submitted
        );
    }

    /// Exhausting the attempt cap marks the anchor failed and returns it
    /// so the caller can re-batch — never a silent drop.
    #[test]
    fn retry_exhaustion_is_terminal_and_surfaced() {
        let (publisher, adapter) = publisher_with_adapter();
        let batch = batch(2);
        let record = publisher.publish(&batch, &root(), "solana", t0()).unwrap();

        adapter.fail_next_submits(10);

        let mut now = t0();
        let mut failed = Vec::new();
        // Walk cycles well past every backoff deadline.
        for _ in 0..6 {
            failed.extend(publisher.run_submit_cycle(now));
            now += chrono::Duration::seconds(60);
        }

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, record.id);
        let terminal = publisher.get(&record.id).unwrap();
        assert_eq!(terminal.status, AnchorStatus::Failed);
        assert!(terminal.last_error.is_some());
    }

    /// An anchor targeting a chain with no registered adapter fails.
    #[test]
    fn missing_adapter_fails_after_cap() {
        let (publisher, _adapter) = publisher_with_adapter();
        let batch = batch(1);
        publisher.publish(&batch, &root(), "bitcoin", t0()).unwrap();

        let mut now = t0();
        let mut failed = Vec::new();
        for _ in 0..6 {
            failed.extend(publisher.run_submit_cycle(now));
            now += chrono::Duration::seconds(60);
        }

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, AnchorStatus::Failed);
    }

    // ── Confirmation polling ──────────────────────────────────────────────────

    #[test]
    fn confirmation_advances_to_finalized_at_threshold() {
        let (publisher, adapter) = publisher_with_adapter();
        let batch = batch(1);
        let record = publisher.publish(&batch, &root(), "solana", t0()).unwrap();
        publisher.run_submit_cycle(t0());

        // Block inclusion: submitted → confirmed.
        adapter.confirm_all(4242);
        publisher.poll_confirmations(t0());
        let confirmed = publisher.get(&record.id).unwrap();
        assert_eq!(confirmed.status, AnchorStatus::Confirmed);
        assert_eq!(confirmed.block_number, Some(4242));
        assert!(confirmed.confirmed_at.is_some());

        // Threshold (2) reached: confirmed → finalized.
        adapter.advance_confirmations(2);
        publisher.poll_confirmations(t0());
        assert_eq!(
            publisher.get(&record.id).unwrap().status,
            AnchorStatus::Finalized
        );
    }

    /// An unreachable adapter leaves status untouched for the next cycle.
    #[test]
    fn unavailable_adapter_does_not_change_status() {
        let (publisher, adapter) = publisher_with_adapter();
        let batch = batch(1);
        let record = publisher.publish(&batch, &root(), "solana", t0()).unwrap();
        publisher.run_submit_cycle(t0());

        adapter.set_unavailable(true);
        let failed = publisher.poll_confirmations(t0());
        assert!(failed.is_empty());
        assert_eq!(
            publisher.get(&record.id).unwrap().status,
            AnchorStatus::Submitted
        );
    }

    /// A transaction the chain no longer knows (reorg) fails the anchor.
    #[test]
    fn reorged_transaction_fails_the_anchor() {
        let (publisher, adapter) = publisher_with_adapter();
        let batch = batch(1);
        let record = publisher.publish(&batch, &root(), "solana", t0()).unwrap();
        publisher.run_submit_cycle(t0());

        let tx_hash = publisher.get(&record.id).unwrap().tx_hash.unwrap();
        adapter.reorg_out(&tx_hash);

        let failed = publisher.poll_confirmations(t0());
        assert_eq!(failed.len(), 1);
        assert_eq!(
            publisher.get(&record.id).unwrap().status,
            AnchorStatus::Failed
        );
    }

    // ── Deadline enforcement ──────────────────────────────────────────────────

    /// A hung adapter costs the caller only the deadline: the wrapper
    /// reports `Timeout` instead of blocking.
    #[test]
    fn deadline_adapter_times_out_a_hung_call() {
        let hung: Arc<dyn ChainAdapter> = Arc::new(HungAdapter {
            chain: "solana".to_string(),
        });
        let bounded = DeadlineAdapter::new(hung);

        let err = bounded
            .get_confirmation("tx-1", Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, MemstampError::Timeout { .. }));
    }

    /// A compliant adapter passes through the wrapper unchanged.
    #[test]
    fn deadline_adapter_passes_through_a_compliant_call() {
        let mock = Arc::new(MockChainAdapter::new("solana"));
        let bounded = DeadlineAdapter::new(mock.clone() as Arc<dyn ChainAdapter>);

        let tx = bounded
            .submit(&root(), "{}", Duration::from_secs(1))
            .unwrap();
        let confirmation = bounded
            .get_confirmation(&tx.tx_hash, Duration::from_secs(1))
            .unwrap();

        assert_eq!(confirmation.confirmations, 0);
        assert_eq!(mock.submit_count(), 1);
    }
}
