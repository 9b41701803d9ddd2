//! # memstamp-core
//!
//! Core primitives and trust boundaries of the memstamp anchoring engine:
//!
//! - canonical-JSON content hashing and event-hash computation (`hash`)
//! - the Merkle tree builder, prover, and proof verifier (`merkle`)
//! - the `ChainAdapter` and `KeyRegistry` collaborator traits (`traits`)
//! - TOML-loadable engine configuration (`config`)
//!
//! Higher crates (ledger, anchor, verify, service) build on these; this
//! crate holds no mutable engine state of its own.

pub mod config;
pub mod hash;
pub mod merkle;
pub mod traits;

pub use config::EngineConfig;
pub use hash::{compute_event_hash, compute_hash, GENESIS_HASH};
pub use merkle::{verify_proof, MerkleTree};
pub use traits::{ChainAdapter, Confirmation, KeyRegistry, TxHandle};
