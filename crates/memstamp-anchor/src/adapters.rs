//! Chain adapter implementations and decorators.
//!
//! `MockChainAdapter` implements the `ChainAdapter` capability over a
//! scriptable in-memory ledger: tests inject network faults and advance
//! confirmations deterministically, with no real chain involved.
//! `DeadlineAdapter` wraps any adapter and hard-enforces the per-call
//! deadline the trait contract promises.

use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use memstamp_core::traits::{ChainAdapter, Confirmation, TxHandle};
use memstamp_contracts::{MemstampError, MemstampResult};

struct MockTx {
    merkle_root: String,
    block_number: Option<u64>,
    confirmations: u32,
}

struct MockState {
    txs: HashMap<String, MockTx>,
    submit_count: u64,
    /// Fail this many upcoming submissions with a transient fault.
    fail_submits: u32,
    /// Reject the next submission outright.
    reject_next: bool,
    /// Simulate total unreachability (submit and poll both fail).
    unavailable: bool,
}

/// A scriptable, in-memory external ledger.
pub struct MockChainAdapter {
    chain: String,
    state: Mutex<MockState>,
}

impl MockChainAdapter {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            state: Mutex::new(MockState {
                txs: HashMap::new(),
                submit_count: 0,
                fail_submits: 0,
                reject_next: false,
                unavailable: false,
            }),
        }
    }

    /// Make the next `n` submissions fail with a transient fault.
    pub fn fail_next_submits(&self, n: u32) {
        self.state.lock().expect("mock adapter lock poisoned").fail_submits = n;
    }

    /// Make the next submission be rejected by the "ledger".
    pub fn reject_next_submit(&self) {
        self.state.lock().expect("mock adapter lock poisoned").reject_next = true;
    }

    /// Toggle total unreachability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().expect("mock adapter lock poisoned").unavailable = unavailable;
    }

    /// Include every submitted transaction in `block_number`.
    pub fn confirm_all(&self, block_number: u64) {
        let mut state = self.state.lock().expect("mock adapter lock poisoned");
        for tx in state.txs.values_mut() {
            tx.block_number.get_or_insert(block_number);
        }
    }

    /// Add `n` confirmations on top of every included transaction.
    pub fn advance_confirmations(&self, n: u32) {
        let mut state = self.state.lock().expect("mock adapter lock poisoned");
        for tx in state.txs.values_mut() {
            if tx.block_number.is_some() {
                tx.confirmations += n;
            }
        }
    }

    /// Drop a transaction as if a reorg removed it from the ledger.
    pub fn reorg_out(&self, tx_hash: &str) {
        let mut state = self.state.lock().expect("mock adapter lock poisoned");
        state.txs.remove(tx_hash);
    }

    /// Roots submitted so far, for assertions.
    pub fn submitted_roots(&self) -> Vec<String> {
        let state = self.state.lock().expect("mock adapter lock poisoned");
        state.txs.values().map(|tx| tx.merkle_root.clone()).collect()
    }

    pub fn submit_count(&self) -> u64 {
        self.state.lock().expect("mock adapter lock poisoned").submit_count
    }
}

impl ChainAdapter for MockChainAdapter {
    fn chain(&self) -> &str {
        &self.chain
    }

    fn submit(
        &self,
        merkle_root: &str,
        _metadata: &str,
        _timeout: Duration,
    ) -> MemstampResult<TxHandle> {
        let mut state = self.state.lock().expect("mock adapter lock poisoned");

        if state.unavailable {
            return Err(MemstampError::ChainAdapterUnavailable {
                chain: self.chain.clone(),
                reason: "adapter unreachable".to_string(),
            });
        }
        if state.fail_submits > 0 {
            state.fail_submits -= 1;
            return Err(MemstampError::ChainAdapterUnavailable {
                chain: self.chain.clone(),
                reason: "simulated network fault".to_string(),
            });
        }
        if state.reject_next {
            state.reject_next = false;
            return Err(MemstampError::ChainAdapterRejected {
                chain: self.chain.clone(),
                reason: "simulated rejection".to_string(),
            });
        }

        state.submit_count += 1;
        let tx_hash = format!("mock-tx-{:06}", state.submit_count);
        state.txs.insert(
            tx_hash.clone(),
            MockTx {
                merkle_root: merkle_root.to_string(),
                block_number: None,
                confirmations: 0,
            },
        );
        Ok(TxHandle { tx_hash })
    }

    fn get_confirmation(&self, tx_hash: &str, _timeout: Duration) -> MemstampResult<Confirmation> {
        let state = self.state.lock().expect("mock adapter lock poisoned");

        if state.unavailable {
            return Err(MemstampError::ChainAdapterUnavailable {
                chain: self.chain.clone(),
                reason: "adapter unreachable".to_string(),
            });
        }

        match state.txs.get(tx_hash) {
            Some(tx) => Ok(Confirmation {
                block_number: tx.block_number,
                confirmations: tx.confirmations,
            }),
            None => Err(MemstampError::ChainAdapterRejected {
                chain: self.chain.clone(),
                reason: format!("unknown transaction '{}'", tx_hash),
            }),
        }
    }
}

// ── Deadline enforcement ──────────────────────────────────────────────────────

/// Wraps an adapter and hard-enforces the per-call deadline.
///
/// The trait contract already requires implementations to return within
/// the deadline, but a misbehaving adapter could still hang its caller.
/// This decorator runs the wrapped call on its own thread and turns an
/// overdue call into `Timeout`; the straggler thread finishes on its own
/// with its result discarded.
pub struct DeadlineAdapter {
    inner: Arc<dyn ChainAdapter>,
}

impl DeadlineAdapter {
    pub fn new(inner: Arc<dyn ChainAdapter>) -> Self {
        Self { inner }
    }

    fn bounded<T: Send + 'static>(
        timeout: Duration,
        operation: &str,
        call: impl FnOnce() -> MemstampResult<T> + Send + 'static,
    ) -> MemstampResult<T> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver is gone if the caller already timed out.
            let _ = tx.send(call());
        });
        match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(_) => Err(MemstampError::Timeout {
                operation: operation.to_string(),
            }),
        }
    }
}

impl ChainAdapter for DeadlineAdapter {
    fn chain(&self) -> &str {
        self.inner.chain()
    }

    fn submit(
        &self,
        merkle_root: &str,
        metadata: &str,
        timeout: Duration,
    ) -> MemstampResult<TxHandle> {
        let inner = self.inner.clone();
        let merkle_root = merkle_root.to_string();
        let metadata = metadata.to_string();
        Self::bounded(timeout, "submit", move || {
            inner.submit(&merkle_root, &metadata, timeout)
        })
    }

    fn get_confirmation(&self, tx_hash: &str, timeout: Duration) -> MemstampResult<Confirmation> {
        let inner = self.inner.clone();
        let tx_hash = tx_hash.to_string();
        Self::bounded(timeout, "get_confirmation", move || {
            inner.get_confirmation(&tx_hash, timeout)
        })
    }
}
