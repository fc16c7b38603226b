use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::types::timestamp::{HybridClock, DEFAULT_LOGICAL_BITS};

pub mod loader;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:9410".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TsoConfig {
    /// Must be identical on every replica and client.
    pub logical_bits: u32,
    pub update_interval_ms: u64,
    /// Last physical time persisted by a previous leader. 0 when unknown.
    pub initial_physical_ms: u64,
    /// Defaults to one eighth of the logical space.
    pub max_batch_size: Option<u32>,
}

impl Default for TsoConfig {
    fn default() -> Self {
        TsoConfig {
            logical_bits: DEFAULT_LOGICAL_BITS,
            update_interval_ms: 50,
            initial_physical_ms: 0,
            max_batch_size: None,
        }
    }
}

impl TsoConfig {
    pub fn validate(&self) -> Result<()> {
        let clock = self.clock()?;

        if self.update_interval_ms == 0 {
            return Err(Error::ConfigError("tso.update_interval_ms must be positive".to_string()));
        }

        if let Some(max) = self.max_batch_size {
            if max == 0 || max as u64 >= clock.max_logical() {
                return Err(Error::ConfigError(format!(
                    "tso.max_batch_size must be in 1..{}, got {}",
                    clock.max_logical(),
                    max
                )));
            }
        }

        Ok(())
    }

    pub fn clock(&self) -> Result<HybridClock> {
        HybridClock::new(self.logical_bits)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ElectionConfig {
    /// Run as the only replica; leadership is held until resigned.
    pub standalone: bool,
    pub poll_interval_ms: u64,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        ElectionConfig {
            standalone: true,
            poll_interval_ms: 100,
        }
    }
}

impl ElectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::ConfigError("election.poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}
