//! # Configuration Management
//!
//! Wire-format constants and runtime configuration for the packet and
//! routing layers.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! The logging exclusion list lives here deliberately: which targets are
//! silenced is decided at node startup and injected into the subscriber,
//! never toggled through process-global state at runtime.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Fixed length of a binary peer identifier.
pub const PEER_ID_SIZE: usize = 20;

/// Packet header size: protocol(2) + subProtocol(2) + src + dest(1) +
/// ttl(1) + payloadLength(4).
pub const PACKET_HEADER_SIZE: usize = 10 + PEER_ID_SIZE;

/// Packet footer size: one 64-bit integrity hash.
pub const PACKET_FOOTER_SIZE: usize = 8;

/// Max allowed payload size (16 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default read-chunk size for the blocking packet reader.
pub const PACKET_BUFFER_SIZE: usize = 4096;

/// How many times a zero-progress write is retried before surfacing.
pub const PACKET_REWRITE_LIMIT: u32 = 10;

/// Fixed delay between short-write retries.
pub const PACKET_REWRITE_DELAY: Duration = Duration::from_millis(100);

/// Highest valid send-queue priority class.
pub const SEND_QUEUE_MAX_PRIORITY: u8 = 15;

/// Top-level configuration for the packet and routing layers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Codec (framing) configuration
    #[serde(default)]
    pub codec: CodecConfig,

    /// Routing configuration
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::Config(format!("failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::Config(format!("failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(max) = std::env::var("PEERWIRE_MAX_PAYLOAD_SIZE") {
            if let Ok(val) = max.parse::<usize>() {
                config.codec.max_payload_size = val;
            }
        }

        if let Ok(limit) = std::env::var("PEERWIRE_REWRITE_LIMIT") {
            if let Ok(val) = limit.parse::<u32>() {
                config.codec.rewrite_limit = val;
            }
        }

        if let Ok(delay) = std::env::var("PEERWIRE_REWRITE_DELAY_MS") {
            if let Ok(val) = delay.parse::<u64>() {
                config.codec.rewrite_delay = Duration::from_millis(val);
            }
        }

        if let Ok(priority) = std::env::var("PEERWIRE_DEFAULT_PRIORITY") {
            if let Ok(val) = priority.parse::<u8>() {
                config.routing.default_priority = val;
            }
        }

        Ok(config)
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.codec.validate());
        errors.extend(self.routing.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Config(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Framing configuration shared by the codec, the blocking reader/writer
/// and the duplex packet buffer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodecConfig {
    /// Maximum accepted payload length; a decoded length above this is a
    /// protocol violation, fatal to the connection.
    pub max_payload_size: usize,

    /// Read-chunk size for the blocking reader.
    pub buffer_size: usize,

    /// Short-write retry budget for the blocking writer.
    pub rewrite_limit: u32,

    /// Fixed delay between short-write retries.
    #[serde(with = "duration_serde")]
    pub rewrite_delay: Duration,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            buffer_size: PACKET_BUFFER_SIZE,
            rewrite_limit: PACKET_REWRITE_LIMIT,
            rewrite_delay: PACKET_REWRITE_DELAY,
        }
    }
}

impl CodecConfig {
    /// Validate codec configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("max payload size cannot be 0".to_string());
        } else if self.max_payload_size > u32::MAX as usize {
            errors.push(format!(
                "max payload size {} does not fit the 4-byte length field",
                self.max_payload_size
            ));
        }

        if self.buffer_size == 0 {
            errors.push("buffer size cannot be 0".to_string());
        }

        if self.rewrite_delay.as_secs() > 10 {
            errors.push("rewrite delay too long (maximum: 10s)".to_string());
        }

        errors
    }
}

/// Routing configuration for memberships.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Send-queue priority class stamped on outbound packets when the
    /// membership does not override it.
    pub default_priority: u8,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_priority: 0,
        }
    }
}

impl RoutingConfig {
    /// Validate routing configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.default_priority > SEND_QUEUE_MAX_PRIORITY {
            errors.push(format!(
                "default priority {} above maximum {}",
                self.default_priority, SEND_QUEUE_MAX_PRIORITY
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Targets silenced entirely (e.g. `"peerwire::routing"`). Injected
    /// into the subscriber at startup; there is no runtime toggle.
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            excludes: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for target in &self.excludes {
            if target.is_empty() {
                errors.push("logging exclude targets cannot be empty".to_string());
            }
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(NetworkConfig::default().validate().is_empty());
    }

    #[test]
    fn test_zero_payload_max_rejected() {
        let mut config = NetworkConfig::default();
        config.codec.max_payload_size = 0;
        assert!(!config.validate().is_empty());
        assert!(config.validate_strict().is_err());
    }

    #[test]
    fn test_priority_above_bound_rejected() {
        let mut config = NetworkConfig::default();
        config.routing.default_priority = SEND_QUEUE_MAX_PRIORITY + 1;
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_toml_roundtrip() {
        let toml = r#"
            [codec]
            max_payload_size = 1048576
            buffer_size = 8192
            rewrite_limit = 3
            rewrite_delay = 50

            [routing]
            default_priority = 2

            [logging]
            log_level = "debug"
            excludes = ["peerwire::routing"]
        "#;
        let config = NetworkConfig::from_toml(toml).expect("parse");
        assert_eq!(config.codec.max_payload_size, 1048576);
        assert_eq!(config.codec.rewrite_delay, Duration::from_millis(50));
        assert_eq!(config.routing.default_priority, 2);
        assert_eq!(config.logging.log_level, Level::DEBUG);
        assert_eq!(config.logging.excludes, vec!["peerwire::routing"]);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_partial_toml_uses_defaults() {
        let config = NetworkConfig::from_toml("[codec]\nmax_payload_size = 4096\n").expect("parse");
        assert_eq!(config.codec.max_payload_size, 4096);
        assert_eq!(config.codec.rewrite_limit, PACKET_REWRITE_LIMIT);
        assert_eq!(config.logging.log_level, Level::INFO);
    }

    #[test]
    fn test_header_size_matches_field_layout() {
        assert_eq!(PACKET_HEADER_SIZE, 2 + 2 + PEER_ID_SIZE + 1 + 1 + 4);
    }
}
