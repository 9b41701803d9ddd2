//! Engine configuration, loadable from TOML.
//!
//! Batch-closing policy, retry/backoff constants, and the finality
//! threshold are deliberately configuration, not code: the anchoring
//! economics (chain write cost vs. staleness) differ per deployment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use memstamp_contracts::{MemstampError, MemstampResult};

/// All tunables of the anchoring engine.
///
/// Every field has a default, so a partial TOML file (or none at all) is
/// valid.  Defaults mirror a production posture: large batches, a five
/// minute staleness cap, and Solana-style finality depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A batch closes as soon as it holds this many stamps.
    pub batch_max_size: usize,

    /// A non-empty batch closes once it has been open this long.
    pub batch_max_age_secs: u64,

    /// First retry delay after a failed submission; doubles per attempt.
    pub retry_base_delay_ms: u64,

    /// Submission attempts before an anchor is marked failed.
    pub retry_max_attempts: u32,

    /// Confirmations required to advance `confirmed` → `finalized`.
    pub finality_threshold: u32,

    /// Deadline applied to every chain-adapter call.
    pub adapter_timeout_ms: u64,

    /// The chain new anchors target.
    pub default_chain: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_max_size: 1000,
            batch_max_age_secs: 300,
            retry_base_delay_ms: 1000,
            retry_max_attempts: 5,
            finality_threshold: 32,
            adapter_timeout_ms: 5000,
            default_chain: "solana".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// Missing keys fall back to their defaults.  Returns `ConfigError`
    /// for unreadable files, parse failures, or out-of-range values.
    pub fn from_file(path: &Path) -> MemstampResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MemstampError::ConfigError {
            reason: format!("cannot read config file {}: {}", path.display(), e),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| MemstampError::ConfigError {
            reason: format!("cannot parse config file {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot operate under.
    pub fn validate(&self) -> MemstampResult<()> {
        if self.batch_max_size == 0 {
            return Err(MemstampError::ConfigError {
                reason: "batch_max_size must be at least 1".to_string(),
            });
        }
        if self.retry_max_attempts == 0 {
            return Err(MemstampError::ConfigError {
                reason: "retry_max_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The batch staleness cap as a `Duration`.
    pub fn batch_max_age(&self) -> Duration {
        Duration::from_secs(self.batch_max_age_secs)
    }

    /// The chain-adapter call deadline as a `Duration`.
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Exponential backoff delay before retry `attempt` (0-based).
    ///
    /// `base * 2^attempt`, saturating, with the exponent capped so large
    /// attempt counts cannot overflow.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_max_size, 1000);
        assert_eq!(config.batch_max_age(), Duration::from_secs(300));
        assert_eq!(config.default_chain, "solana");
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: EngineConfig =
            toml::from_str("batch_max_size = 3\nbatch_max_age_secs = 1").unwrap();
        assert_eq!(config.batch_max_size, 3);
        assert_eq!(config.batch_max_age_secs, 1);
        // Unspecified keys keep their defaults.
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.default_chain, "solana");
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = EngineConfig {
            batch_max_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MemstampError::ConfigError { .. })
        ));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = EngineConfig {
            retry_base_delay_ms: 100,
            ..EngineConfig::default()
        };
        assert_eq!(config.retry_delay(0), Duration::from_millis(100));
        assert_eq!(config.retry_delay(1), Duration::from_millis(200));
        assert_eq!(config.retry_delay(3), Duration::from_millis(800));
        // Huge attempt counts saturate instead of overflowing.
        assert!(config.retry_delay(200) >= config.retry_delay(20));
    }
}
