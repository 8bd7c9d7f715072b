//! Session retention configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Context length that triggers compression
    #[serde(default = "default_max_history")]
    pub max_history_length: usize,

    /// Inactivity after which a session is evicted
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Cadence of the session and cache sweeper
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_history_length < 2 {
            return Err(ValidationError::HistoryTooShort(self.max_history_length));
        }
        if self.ttl_secs == 0 {
            return Err(ValidationError::MustBePositive {
                field: "session.ttl_secs",
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::MustBePositive {
                field: "session.sweep_interval_secs",
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_length: default_max_history(),
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_max_history() -> usize {
    50
}

fn default_ttl() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval() -> u64 {
    300
}
