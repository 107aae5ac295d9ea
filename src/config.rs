//! # Store Configuration
//!
//! Capacity knobs for the dense collections, validated before use.
//!
//! Both capacities bound per-document size: `block_capacity` caps the number
//! of genotype calls packed into one block, `batch_capacity` caps the number
//! of marker ids embedded in one map batch. A map may override the block
//! capacity at creation time; the batch capacity is store-wide.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Default number of genotype calls per block
pub const DEFAULT_BLOCK_CAPACITY: usize = 10_000;

/// Default number of marker ids per map batch
pub const DEFAULT_BATCH_CAPACITY: usize = 100_000;

/// Store-wide configuration, persisted in the manifest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum genotype calls per block document
    #[serde(default = "default_block_capacity")]
    pub block_capacity: usize,

    /// Maximum marker ids per map-batch document
    #[serde(default = "default_batch_capacity")]
    pub batch_capacity: usize,
}

fn default_block_capacity() -> usize {
    DEFAULT_BLOCK_CAPACITY
}

fn default_batch_capacity() -> usize {
    DEFAULT_BATCH_CAPACITY
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Validate capacity values
    pub fn validate(&self) -> Result<()> {
        if self.block_capacity == 0 {
            return Err(StoreError::invalid_config("block_capacity must be > 0"));
        }
        if self.batch_capacity == 0 {
            return Err(StoreError::invalid_config("batch_capacity must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_capacity, 10_000);
        assert_eq!(config.batch_capacity, 100_000);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = StoreConfig {
            block_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig { .. })
        ));

        let config = StoreConfig {
            batch_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());

        let config: StoreConfig = serde_json::from_str(r#"{"block_capacity": 5}"#).unwrap();
        assert_eq!(config.block_capacity, 5);
        assert_eq!(config.batch_capacity, 100_000);
    }
}
