//! # memstamp-contracts
//!
//! Shared types and error taxonomy for the memstamp anchoring engine.
//!
//! All crates in the workspace import from here.  No business logic lives
//! in this crate — only data definitions and error types.

pub mod anchor;
pub mod error;
pub mod event;
pub mod merkle;
pub mod stamp;
pub mod verify;

pub use anchor::{AnchorRecord, AnchorStatus};
pub use error::{MemstampError, MemstampResult};
pub use event::{Event, EventType, VCOT_VERSION};
pub use merkle::{MerkleProof, ProofPosition, ProofStep};
pub use stamp::{AgentRecord, CreateStampRequest, Stamp, StampStatus};
pub use verify::VerificationResult;
