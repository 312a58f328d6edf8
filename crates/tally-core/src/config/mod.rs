//! Engine configuration.
//!
//! `EngineConfig` carries the replication tunables shared by the CLI and any
//! embedding app. Every field has a default, so an empty JSON object is a
//! valid config file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
const DEFAULT_CATCH_UP_SECS: u64 = 60;
const DEFAULT_BULK_BATCH_SIZE: usize = 500;

/// Replication tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Quiet period before a listener drains its change sets
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Interval of the catch-up tick that retries failed copies and refreshes replicas
    #[serde(default = "default_catch_up_secs")]
    pub catch_up_secs: u64,
    /// Records enqueued between cooperative yields during a bulk copy
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            catch_up_secs: DEFAULT_CATCH_UP_SECS,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
        }
    }
}

impl EngineConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn catch_up_interval(&self) -> Duration {
        Duration::from_secs(self.catch_up_secs)
    }

    /// Parse and validate a JSON config payload
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(payload) => Self::from_json(&payload),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No engine config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.catch_up_secs == 0 {
            return Err(Error::InvalidInput(
                "catch_up_secs must be greater than zero".to_string(),
            ));
        }
        if self.bulk_batch_size == 0 {
            return Err(Error::InvalidInput(
                "bulk_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

const fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

const fn default_catch_up_secs() -> u64 {
    DEFAULT_CATCH_UP_SECS
}

const fn default_bulk_batch_size() -> usize {
    DEFAULT_BULK_BATCH_SIZE
}
