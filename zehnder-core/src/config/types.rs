//! Configuration type definitions
//!
//! All timings are in milliseconds on the host's monotonic clock.

use serde::{Deserialize, Serialize};
use zehnder_hal::RadioConfig;
use zehnder_protocol::DEFAULT_TTL;

/// Time between settings queries while idle
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10_000;

/// Time to wait for a reply before retransmitting
pub const DEFAULT_REPLY_TIMEOUT_MS: u32 = 2_000;

/// Time to wait for the driver's transmit-complete
pub const DEFAULT_TRANSMIT_TIMEOUT_MS: u32 = 500;

/// Time to wait for a free channel before giving up on a send
pub const DEFAULT_AIRWAY_TIMEOUT_MS: u32 = 5_000;

/// Transmissions per operational request
pub const DEFAULT_TX_RETRIES: u8 = 10;

/// Transmissions per join step
pub const DEFAULT_JOIN_RETRIES: u8 = 5;

/// Time allowed for each join step
pub const DEFAULT_JOIN_TIMEOUT_MS: u32 = 10_000;

/// First delay between failed join attempts
pub const DEFAULT_JOIN_BACKOFF_MS: u32 = 1_000;

/// Upper bound for the join backoff
pub const DEFAULT_JOIN_BACKOFF_MAX_MS: u32 = 60_000;

/// Symptom-free time before an error code clears
pub const DEFAULT_HEALTHY_INTERVAL_MS: u32 = 10_000;

/// Filter runtime before replacement is flagged (about six months)
pub const DEFAULT_FILTER_THRESHOLD_HOURS: u32 = 4_380;

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A timeout or interval is zero
    ZeroTimeout,
    /// A retry budget is zero
    ZeroRetries,
    /// Poll interval shorter than the reply timeout
    PollIntervalTooShort,
    /// Initial backoff larger than the backoff cap
    BackoffRange,
    /// TTL of zero would be dropped by the unit
    ZeroTtl,
}

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    pub poll_interval_ms: u32,
    pub reply_timeout_ms: u32,
    pub transmit_timeout_ms: u32,
    pub airway_timeout_ms: u32,
    /// Transmissions per operational request (at least 1)
    pub tx_retries: u8,
    /// Transmissions per join step (at least 1)
    pub join_retries: u8,
    pub join_timeout_ms: u32,
    pub join_backoff_ms: u32,
    pub join_backoff_max_ms: u32,
    pub healthy_interval_ms: u32,
    /// `None` disables the filter reminder
    pub filter_threshold_hours: Option<u32>,
    pub ttl: u8,
    /// Band, channel, CRC and power; addresses are overwritten by the engine
    pub radio: RadioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            transmit_timeout_ms: DEFAULT_TRANSMIT_TIMEOUT_MS,
            airway_timeout_ms: DEFAULT_AIRWAY_TIMEOUT_MS,
            tx_retries: DEFAULT_TX_RETRIES,
            join_retries: DEFAULT_JOIN_RETRIES,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            join_backoff_ms: DEFAULT_JOIN_BACKOFF_MS,
            join_backoff_max_ms: DEFAULT_JOIN_BACKOFF_MAX_MS,
            healthy_interval_ms: DEFAULT_HEALTHY_INTERVAL_MS,
            filter_threshold_hours: Some(DEFAULT_FILTER_THRESHOLD_HOURS),
            ttl: DEFAULT_TTL,
            radio: RadioConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            self.poll_interval_ms,
            self.reply_timeout_ms,
            self.transmit_timeout_ms,
            self.airway_timeout_ms,
            self.join_timeout_ms,
            self.healthy_interval_ms,
        ];
        if timeouts.contains(&0) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.tx_retries == 0 || self.join_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.poll_interval_ms < self.reply_timeout_ms {
            return Err(ConfigError::PollIntervalTooShort);
        }
        if self.join_backoff_ms > self.join_backoff_max_ms {
            return Err(ConfigError::BackoffRange);
        }
        if self.ttl == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        Ok(())
    }

    /// Timings used by the link transmitter
    pub fn link_timings(&self) -> LinkTimings {
        LinkTimings {
            reply_timeout_ms: self.reply_timeout_ms,
            transmit_timeout_ms: self.transmit_timeout_ms,
            airway_timeout_ms: self.airway_timeout_ms,
        }
    }
}

/// Link transmitter timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkTimings {
    pub reply_timeout_ms: u32,
    pub transmit_timeout_ms: u32,
    pub airway_timeout_ms: u32,
}

impl Default for LinkTimings {
    fn default() -> Self {
        EngineConfig::default().link_timings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EngineConfig {
            reply_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));

        let config = EngineConfig {
            tx_retries: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRetries));

        let config = EngineConfig {
            poll_interval_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::PollIntervalTooShort));

        let config = EngineConfig {
            join_backoff_ms: 120_000,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::BackoffRange));

        let config = EngineConfig {
            ttl: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTtl));
    }

    #[test]
    fn test_postcard_roundtrip() {
        let config = EngineConfig {
            poll_interval_ms: 30_000,
            filter_threshold_hours: None,
            ..Default::default()
        };
        let mut buffer = [0u8; 96];
        let used = postcard::to_slice(&config, &mut buffer).unwrap();
        let decoded: EngineConfig = postcard::from_bytes(used).unwrap();
        assert_eq!(decoded, config);
    }
}
