//! Batch accumulation: size/age-triggered closing of anchor batches.
//!
//! A batch closes when it reaches `max_size` stamps OR when `max_age` has
//! elapsed since it opened — whichever comes first.  The age timer starts
//! on the first enqueue into a fresh batch, so an idle system never
//! spontaneously closes an empty batch.
//!
//! Time is injected (`now` parameters) rather than read from the clock, so
//! the closing policy is directly testable without sleeping.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// A closed batch, ready for Merkle building and anchoring.
///
/// `stamp_ids` preserve enqueue order — that order is the Merkle leaf
/// order and must not be permuted.
#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_id: Uuid,
    pub stamp_ids: Vec<Uuid>,
    /// First enqueue into the batch.
    pub opened_at: DateTime<Utc>,
    /// When the size or age trigger fired.
    pub closed_at: DateTime<Utc>,
}

struct OpenBatch {
    batch_id: Uuid,
    stamp_ids: Vec<Uuid>,
    opened_at: DateTime<Utc>,
}

struct BatcherState {
    open: Option<OpenBatch>,
    closed: Vec<Batch>,
}

/// Accumulates pending stamps into batches bounded by size and staleness.
pub struct Batcher {
    max_size: usize,
    max_age: chrono::Duration,
    state: Mutex<BatcherState>,
}

impl Batcher {
    pub fn new(max_size: usize, max_age: Duration) -> Self {
        Self {
            max_size,
            max_age: chrono::Duration::milliseconds(max_age.as_millis() as i64),
            state: Mutex::new(BatcherState {
                open: None,
                closed: Vec::new(),
            }),
        }
    }

    /// Add a stamp to the current open batch, opening one if necessary.
    ///
    /// Reaching `max_size` closes the batch immediately — no age wait.
    pub fn enqueue(&self, stamp_id: Uuid, now: DateTime<Utc>) {
        let mut state = self.state.lock().expect("batcher state lock poisoned");

        let open = state.open.get_or_insert_with(|| {
            debug!("opening fresh batch");
            OpenBatch {
                batch_id: Uuid::new_v4(),
                stamp_ids: Vec::new(),
                opened_at: now,
            }
        });
        open.stamp_ids.push(stamp_id);

        if open.stamp_ids.len() >= self.max_size {
            let open = state.open.take().expect("open batch just populated");
            debug!(
                batch_id = %open.batch_id,
                size = open.stamp_ids.len(),
                "batch closed by size trigger"
            );
            state.closed.push(Batch {
                batch_id: open.batch_id,
                stamp_ids: open.stamp_ids,
                opened_at: open.opened_at,
                closed_at: now,
            });
        }
    }

    /// Drain every batch that has closed, in closing order.
    ///
    /// Also applies the age trigger: a non-empty open batch older than
    /// `max_age` closes first and is included in the drain.
    pub fn take_closed_batches(&self, now: DateTime<Utc>) -> Vec<Batch> {
        let mut state = self.state.lock().expect("batcher state lock poisoned");

        let age_expired = state
            .open
            .as_ref()
            .map(|open| now - open.opened_at >= self.max_age)
            .unwrap_or(false);
        if age_expired {
            let open = state.open.take().expect("open batch checked above");
            debug!(
                batch_id = %open.batch_id,
                size = open.stamp_ids.len(),
                "batch closed by age trigger"
            );
            state.closed.push(Batch {
                batch_id: open.batch_id,
                stamp_ids: open.stamp_ids,
                opened_at: open.opened_at,
                closed_at: now,
            });
        }

        std::mem::take(&mut state.closed)
    }

    /// Stamps waiting in the open batch (not yet closed).
    pub fn open_len(&self) -> usize {
        let state = self.state.lock().expect("batcher state lock poisoned");
        state.open.as_ref().map(|b| b.stamp_ids.len()).unwrap_or(0)
    }
}
