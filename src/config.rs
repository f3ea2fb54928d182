//! Immutable configuration accepted at construction (spec §6).
//!
//! `Config::validate` is the only place construction can fail
//! (spec §7: "Configuration errors ... construction fails; no partial
//! system exists").

use crate::error::ConfigError;
use crate::message::MessageType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate/flood-guard sub-configuration (spec §4.3 / §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    pub max_per_second: u32,
    pub max_per_minute: u32,
    pub max_burst: u32,
    pub window: Duration,
    pub suspicion_threshold: u32,
}

/// Staged-ban sub-configuration (spec §4.3 / §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanConfig {
    pub first_duration: Duration,
    pub final_duration: Duration,
    pub final_strike: u32,
}

/// The full, validated configuration object the core is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub max_data_packet_size: usize,
    pub connection_timeout: Duration,
    pub max_connections: usize,
    pub retry_attempts: u32,
    pub rate: RateConfig,
    pub ban: BanConfig,
    pub autoban_enabled: bool,
    pub emergency_bypass: bool,
    pub emergency_types: Vec<MessageType>,
    pub message_lifetime: Duration,
    pub cleanup_interval: Duration,
    pub default_ttl: u8,
    pub heartbeat_interval: Duration,
    pub peer_timeout: Duration,
    pub stop_drain_deadline: Duration,
    pub suspicious_ttl_cap: u8,
    pub max_peer_records: usize,
    pub outbound_queue_cap: usize,
    pub n_dedup: usize,
    pub n_replay: usize,
    pub metadata_retention_cap: usize,
}

impl Default for Config {
    /// The "Default" column of spec §6's configuration table.
    fn default() -> Self {
        Self {
            max_data_packet_size: 1024 * 1024,
            connection_timeout: Duration::from_secs(30),
            max_connections: 15,
            retry_attempts: 3,
            rate: RateConfig {
                max_per_second: 10,
                max_per_minute: 100,
                max_burst: 20,
                window: Duration::from_secs(60),
                suspicion_threshold: 5,
            },
            ban: BanConfig {
                first_duration: Duration::from_secs(2 * 3600),
                final_duration: Duration::from_secs(5 * 24 * 3600),
                final_strike: 3,
            },
            autoban_enabled: true,
            emergency_bypass: true,
            emergency_types: vec![
                MessageType::EmergencyMedical,
                MessageType::EmergencyDanger,
                MessageType::KeyExchange,
                MessageType::System,
            ],
            message_lifetime: Duration::from_secs(24 * 3600),
            cleanup_interval: Duration::from_secs(3600),
            default_ttl: 7,
            heartbeat_interval: Duration::from_secs(10),
            peer_timeout: Duration::from_secs(30),
            stop_drain_deadline: Duration::from_secs(1),
            suspicious_ttl_cap: 2,
            max_peer_records: 1024,
            outbound_queue_cap: 4096,
            n_dedup: 4096,
            n_replay: 4096,
            metadata_retention_cap: 100,
        }
    }
}

impl Config {
    /// The "Disaster profile" column of spec §6's configuration table.
    pub fn disaster_profile() -> Self {
        Self {
            max_data_packet_size: 512 * 1024,
            connection_timeout: Duration::from_secs(20),
            max_connections: 10,
            retry_attempts: 2,
            rate: RateConfig {
                max_per_second: 5,
                max_per_minute: 50,
                max_burst: 10,
                window: Duration::from_secs(60),
                suspicion_threshold: 5,
            },
            ..Self::default()
        }
    }

    /// Reject any non-positive numeric option (spec §6).
    pub fn validate(&self) -> Result<(), ConfigError> {
        macro_rules! positive {
            ($field:expr, $name:literal) => {
                if $field == 0 {
                    return Err(ConfigError::NotPositive {
                        field: $name,
                        value: 0,
                    });
                }
            };
        }
        positive!(self.max_data_packet_size, "max_data_packet_size");
        positive!(self.connection_timeout.as_nanos(), "connection_timeout");
        positive!(self.max_connections, "max_connections");
        positive!(self.retry_attempts, "retry_attempts");
        positive!(self.rate.max_per_second, "rate.max_per_second");
        positive!(self.rate.max_per_minute, "rate.max_per_minute");
        positive!(self.rate.max_burst, "rate.max_burst");
        positive!(self.rate.window.as_nanos(), "rate.window");
        positive!(self.rate.suspicion_threshold, "rate.suspicion_threshold");
        positive!(self.ban.first_duration.as_nanos(), "ban.first_duration");
        positive!(self.ban.final_duration.as_nanos(), "ban.final_duration");
        positive!(self.ban.final_strike, "ban.final_strike");
        positive!(self.message_lifetime.as_nanos(), "message_lifetime");
        positive!(self.cleanup_interval.as_nanos(), "cleanup_interval");
        positive!(self.default_ttl, "default_ttl");
        positive!(self.heartbeat_interval.as_nanos(), "heartbeat_interval");
        positive!(self.peer_timeout.as_nanos(), "peer_timeout");
        positive!(self.stop_drain_deadline.as_nanos(), "stop_drain_deadline");
        positive!(self.suspicious_ttl_cap, "suspicious_ttl_cap");
        positive!(self.max_peer_records, "max_peer_records");
        positive!(self.outbound_queue_cap, "outbound_queue_cap");
        positive!(self.n_dedup, "n_dedup");
        positive!(self.n_replay, "n_replay");
        positive!(self.metadata_retention_cap, "metadata_retention_cap");
        if self.emergency_bypass && self.emergency_types.is_empty() {
            return Err(ConfigError::Empty { field: "emergency_types" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn disaster_profile_validates() {
        Config::disaster_profile().validate().unwrap();
    }

    #[test]
    fn zero_field_rejected() {
        let mut c = Config::default();
        c.max_connections = 0;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::NotPositive {
                field: "max_connections",
                ..
            })
        ));
    }

    #[test]
    fn empty_emergency_types_rejected_when_bypass_enabled() {
        let mut c = Config::default();
        c.emergency_types.clear();
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Empty { field: "emergency_types" })
        ));
    }

    #[test]
    fn empty_emergency_types_allowed_when_bypass_disabled() {
        let mut c = Config::default();
        c.emergency_types.clear();
        c.emergency_bypass = false;
        c.validate().unwrap();
    }
}
