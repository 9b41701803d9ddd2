//! Ed25519 key registry.
//!
//! Signatures cover the raw 32 digest bytes of an event hash (the
//! `sha256:` prefix stripped and hex-decoded), matching the client SDKs.
//! Keys and signatures travel as lowercase hex strings.

use std::collections::HashMap;
use std::sync::RwLock;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use memstamp_contracts::{MemstampError, MemstampResult};
use memstamp_core::hash::decode_hash;
use memstamp_core::traits::KeyRegistry;

/// An in-memory agent-id → verifying-key registry.
pub struct InMemoryKeyRegistry {
    keys: RwLock<HashMap<String, VerifyingKey>>,
}

impl InMemoryKeyRegistry {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) an agent's public key, given as 64 hex chars.
    pub fn register(&self, agent_id: &str, public_key_hex: &str) -> MemstampResult<()> {
        let bytes = hex::decode(public_key_hex).map_err(|e| MemstampError::SignatureError {
            reason: format!("public key is not valid hex: {}", e),
        })?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| MemstampError::SignatureError {
                reason: "public key must be exactly 32 bytes".to_string(),
            })?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|e| MemstampError::SignatureError {
            reason: format!("invalid public key: {}", e),
        })?;

        let mut keys = self.keys.write().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("key registry lock poisoned: {}", e),
        })?;
        keys.insert(agent_id.to_string(), key);
        Ok(())
    }
}

impl Default for InMemoryKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    /// Validate a hex signature over an event hash for one agent.
    ///
    /// An unregistered agent yields `Ok(false)` — the caller decides what
    /// an unverifiable signature means.  `Err` is reserved for inputs that
    /// cannot even be decoded.
    fn verify_signature(
        &self,
        agent_id: &str,
        event_hash: &str,
        signature: &str,
    ) -> MemstampResult<bool> {
        let keys = self.keys.read().map_err(|e| MemstampError::LedgerPoisoned {
            reason: format!("key registry lock poisoned: {}", e),
        })?;
        let Some(key) = keys.get(agent_id) else {
            return Ok(false);
        };

        let message = decode_hash(event_hash).ok_or_else(|| MemstampError::SignatureError {
            reason: format!("event hash '{}' is not a valid sha256 hash", event_hash),
        })?;
        let sig_bytes = hex::decode(signature).map_err(|e| MemstampError::SignatureError {
            reason: format!("signature is not valid hex: {}", e),
        })?;
        let sig_bytes: [u8; 64] =
            sig_bytes
                .try_into()
                .map_err(|_| MemstampError::SignatureError {
                    reason: "signature must be exactly 64 bytes".to_string(),
                })?;
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);

        Ok(key.verify(&message, &sig).is_ok())
    }
}

/// Derive a signing key and its hex public key from a 32-byte seed.
///
/// Deterministic — intended for tests and demos where reproducible keys
/// matter more than entropy.
pub fn keypair_from_seed(seed: &[u8; 32]) -> (SigningKey, String) {
    let signing_key = SigningKey::from_bytes(seed);
    let public_hex = hex::encode(signing_key.verifying_key().to_bytes());
    (signing_key, public_hex)
}

/// Sign an event hash, returning the signature as 128 hex chars.
pub fn sign_event_hash(signing_key: &SigningKey, event_hash: &str) -> MemstampResult<String> {
    let message = decode_hash(event_hash).ok_or_else(|| MemstampError::SignatureError {
        reason: format!("event hash '{}' is not a valid sha256 hash", event_hash),
    })?;
    Ok(hex::encode(signing_key.sign(&message).to_bytes()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use memstamp_core::hash::compute_hash;
    use memstamp_core::traits::KeyRegistry as _;

    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let (signing_key, public_hex) = keypair_from_seed(&[7u8; 32]);
        let registry = InMemoryKeyRegistry::new();
        registry.register("agt-1", &public_hex).unwrap();

        let event_hash = compute_hash(&json!({ "step": 1 }));
        let signature = sign_event_hash(&signing_key, &event_hash).unwrap();

        assert!(registry
            .verify_signature("agt-1", &event_hash, &signature)
            .unwrap());
    }

    #[test]
    fn signature_from_wrong_key_fails() {
        let (wrong_key, _) = keypair_from_seed(&[1u8; 32]);
        let (_, public_hex) = keypair_from_seed(&[2u8; 32]);

        let registry = InMemoryKeyRegistry::new();
        registry.register("agt-1", &public_hex).unwrap();

        let event_hash = compute_hash(&json!({ "step": 1 }));
        let signature = sign_event_hash(&wrong_key, &event_hash).unwrap();

        assert!(!registry
            .verify_signature("agt-1", &event_hash, &signature)
            .unwrap());
    }

    #[test]
    fn unregistered_agent_is_unverifiable_not_an_error() {
        let (signing_key, _) = keypair_from_seed(&[3u8; 32]);
        let registry = InMemoryKeyRegistry::new();

        let event_hash = compute_hash(&json!({ "step": 1 }));
        let signature = sign_event_hash(&signing_key, &event_hash).unwrap();

        assert!(!registry
            .verify_signature("agt-unknown", &event_hash, &signature)
            .unwrap());
    }

    #[test]
    fn malformed_signature_is_an_error() {
        let (_, public_hex) = keypair_from_seed(&[4u8; 32]);
        let registry = InMemoryKeyRegistry::new();
        registry.register("agt-1", &public_hex).unwrap();

        let event_hash = compute_hash(&json!({ "step": 1 }));
        let err = registry
            .verify_signature("agt-1", &event_hash, "not-hex")
            .unwrap_err();
        assert!(matches!(err, MemstampError::SignatureError { .. }));
    }

    #[test]
    fn malformed_public_key_is_rejected_at_registration() {
        let registry = InMemoryKeyRegistry::new();
        let err = registry.register("agt-1", "deadbeef").unwrap_err();
        assert!(matches!(err, MemstampError::SignatureError { .. }));
    }
}
