//! # memstamp-verify
//!
//! Stamp verification: recheck a stamp's hash-chain linkage, Merkle
//! inclusion, external-chain confirmation, and signature in one pass, and
//! report every check's outcome individually.
//!
//! The verifier is a pure function over [`VerifyInputs`] — it holds no
//! state and talks to no storage.  The service facade assembles the
//! inputs (chain snapshot, anchor record, adapter, key registry) and
//! interprets the verdict.

pub mod engine;

pub use engine::{verify, VerifyInputs};

// ── Tests ─────────────────────────────────────────────────────────────────────
