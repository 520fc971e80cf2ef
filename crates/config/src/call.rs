//! Telephony and per-call configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Carrier-facing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Human line a committed transfer dials
    #[serde(default = "default_forward_number")]
    pub forward_number: String,

    /// Spoken when the media stream starts
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// WebSocket path the carrier streams media to
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Webhook path the carrier posts new call attempts to
    #[serde(default = "default_incoming_path")]
    pub incoming_path: String,
}

fn default_forward_number() -> String {
    "+16156175000".to_string()
}

fn default_greeting() -> String {
    "Thank you for calling The Illinois Hammer. Are you calling about a new case?".to_string()
}

fn default_stream_path() -> String {
    "/connection".to_string()
}

fn default_incoming_path() -> String {
    "/incoming".to_string()
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            forward_number: default_forward_number(),
            greeting: default_greeting(),
            stream_path: default_stream_path(),
            incoming_path: default_incoming_path(),
        }
    }
}

impl TelephonyConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.forward_number.trim().is_empty() {
            return Err(ConfigError::invalid(
                "telephony.forward_number",
                "Forward number cannot be empty",
            ));
        }

        for (field, path) in [
            ("telephony.stream_path", &self.stream_path),
            ("telephony.incoming_path", &self.incoming_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(
                    field,
                    format!("Path must start with '/', got '{}'", path),
                ));
            }
        }

        Ok(())
    }
}

/// Per-call timings and queue sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Silence after an interim transcript before the buffer is flushed
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    /// Upper bound on waiting for the transfer message to be acknowledged
    #[serde(default = "default_transfer_fallback_ms")]
    pub transfer_fallback_ms: u64,

    /// Playback grace period between acknowledgment and teardown
    #[serde(default = "default_transfer_settle_ms")]
    pub transfer_settle_ms: u64,

    /// How long a committed transfer waits for the carrier's next webhook
    #[serde(default = "default_registry_ttl_ms")]
    pub registry_ttl_ms: u64,

    /// Capacity of each session's event queue
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_quiet_period_ms() -> u64 {
    1200
}

fn default_transfer_fallback_ms() -> u64 {
    15_000
}

fn default_transfer_settle_ms() -> u64 {
    500
}

fn default_registry_ttl_ms() -> u64 {
    10_000
}

fn default_event_capacity() -> usize {
    256
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            transfer_fallback_ms: default_transfer_fallback_ms(),
            transfer_settle_ms: default_transfer_settle_ms(),
            registry_ttl_ms: default_registry_ttl_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl CallConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn transfer_fallback(&self) -> Duration {
        Duration::from_millis(self.transfer_fallback_ms)
    }

    pub fn transfer_settle(&self) -> Duration {
        Duration::from_millis(self.transfer_settle_ms)
    }

    pub fn registry_ttl(&self) -> Duration {
        Duration::from_millis(self.registry_ttl_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=10_000).contains(&self.quiet_period_ms) {
            return Err(ConfigError::invalid(
                "call.quiet_period_ms",
                format!("Must be between 100 and 10000, got {}", self.quiet_period_ms),
            ));
        }

        if !(1_000..=120_000).contains(&self.transfer_fallback_ms) {
            return Err(ConfigError::invalid(
                "call.transfer_fallback_ms",
                format!(
                    "Must be between 1000 and 120000, got {}",
                    self.transfer_fallback_ms
                ),
            ));
        }

        if self.transfer_settle_ms == 0 || self.transfer_settle_ms >= self.transfer_fallback_ms {
            return Err(ConfigError::invalid(
                "call.transfer_settle_ms",
                format!(
                    "Must be positive and shorter than transfer_fallback_ms ({}), got {}",
                    self.transfer_fallback_ms, self.transfer_settle_ms
                ),
            ));
        }

        if !(1_000..=300_000).contains(&self.registry_ttl_ms) {
            return Err(ConfigError::invalid(
                "call.registry_ttl_ms",
                format!("Must be between 1000 and 300000, got {}", self.registry_ttl_ms),
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::invalid(
                "call.event_capacity",
                "Event queue capacity cannot be 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations() {
        let call = CallConfig::default();
        assert_eq!(call.quiet_period(), Duration::from_millis(1200));
        assert_eq!(call.transfer_fallback(), Duration::from_secs(15));
        assert_eq!(call.registry_ttl(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timings_rejected() {
        let mut call = CallConfig::default();
        call.quiet_period_ms = 0;
        assert!(call.validate().is_err());

        let mut call = CallConfig::default();
        call.transfer_settle_ms = 0;
        assert!(call.validate().is_err());
    }

    #[test]
    fn test_relative_paths_rejected() {
        let mut telephony = TelephonyConfig::default();
        telephony.stream_path = "connection".to_string();
        assert!(telephony.validate().is_err());
    }
}
