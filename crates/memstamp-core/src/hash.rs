//! SHA-256 hashing primitives: content fingerprints and event hashes.
//!
//! Every hash in the system is rendered as `"sha256:"` followed by 64
//! lowercase hex chars.  Two distinct hash computations exist:
//!
//! 1. **Content hash** — SHA-256 over the canonical JSON of arbitrary
//!    content (sorted keys, no whitespace).  Computed by clients; the
//!    engine re-exposes it so embedders can fingerprint content the same
//!    way.
//! 2. **Event hash** — SHA-256 over the pipe-joined identifying fields of
//!    one event:
//!    `event_id|event_type|timestamp|agent_id|content_hash|previous_hash`
//!    (UTF-8, RFC 3339 millisecond timestamp).  This is the value the
//!    per-agent chain links on.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// The prefix carried by every rendered hash.
pub const SHA256_PREFIX: &str = "sha256:";

/// The sentinel `previous_hash` for the first event of every agent chain.
///
/// 64 hex zeros — a value that can never be the SHA-256 of real data, so
/// genesis detection is unambiguous.
pub const GENESIS_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// Render a digest as `sha256:` + lowercase hex.
fn render(digest: impl AsRef<[u8]>) -> String {
    format!("{}{}", SHA256_PREFIX, hex::encode(digest))
}

/// Compute the content hash of arbitrary JSON content.
///
/// The content is serialized canonically (object keys sorted recursively,
/// compact separators) before hashing, so two structurally equal values
/// always produce the same fingerprint regardless of construction order.
pub fn compute_hash(content: &serde_json::Value) -> String {
    let canonical = canonical_json(content);
    render(Sha256::digest(canonical.as_bytes()))
}

/// Serialize a JSON value canonically: sorted keys, no whitespace.
pub fn canonical_json(value: &serde_json::Value) -> String {
    // Compact output is serde_json's default; sorting is enforced by
    // rebuilding every object with keys inserted in sorted order.
    serde_json::to_string(&sort_keys(value)).unwrap_or_else(|_| "null".to_string())
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

/// Compute the hash an event chain links on.
///
/// Hash input layout (UTF-8 bytes, pipe-separated, in order):
///   1. event_id
///   2. event_type wire name
///   3. RFC 3339 timestamp (millisecond precision, `Z` suffix)
///   4. agent_id
///   5. content_hash (with `sha256:` prefix)
///   6. previous_hash (with `sha256:` prefix)
pub fn compute_event_hash(
    event_id: &str,
    event_type: &str,
    timestamp: &str,
    agent_id: &str,
    content_hash: &str,
    previous_hash: &str,
) -> String {
    let data = format!(
        "{}|{}|{}|{}|{}|{}",
        event_id, event_type, timestamp, agent_id, content_hash, previous_hash
    );
    render(Sha256::digest(data.as_bytes()))
}

/// Render a timestamp the way event hashes expect it.
///
/// Millisecond precision with a `Z` suffix, matching ISO 8601 output of
/// the client SDKs.  The format is part of the hash input layout and must
/// not change.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Check the `"sha256:" + 64 lowercase hex` format invariant.
pub fn is_valid_content_hash(value: &str) -> bool {
    match value.strip_prefix(SHA256_PREFIX) {
        Some(hex_part) => {
            hex_part.len() == 64
                && hex_part
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        }
        None => false,
    }
}

/// Decode a prefixed hash into its 32 raw digest bytes.
///
/// Returns `None` when the prefix or hex is malformed — callers treat
/// that as verification failure, never as a panic.
pub fn decode_hash(value: &str) -> Option<[u8; 32]> {
    let hex_part = value.strip_prefix(SHA256_PREFIX)?;
    let bytes = hex::decode(hex_part).ok()?;
    let mut out = [0u8; 32];
    if bytes.len() != 32 {
        return None;
    }
    out.copy_from_slice(&bytes);
    Some(out)
}

/// Render 32 raw digest bytes as a prefixed hash.
pub fn encode_hash(digest: &[u8; 32]) -> String {
    render(digest)
}
