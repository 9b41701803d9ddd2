//! # memstamp-service
//!
//! The engine facade: ingestion, lookup, anchoring cycles, and
//! verification over one wired-together ledger/batcher/publisher/verifier
//! stack.  Hosts embed [`MemstampEngine`] and drive its cycles from
//! whatever scheduler they run.

pub mod engine;
pub mod store;

pub use engine::MemstampEngine;
pub use store::StampStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
