//! # Configuration Management
//!
//! Peer configuration: application identity, socket tuning and the
//! multicast discovery endpoint.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - TOML strings via `from_toml()`
//! - Environment overrides via `from_env()` (`PEERWIRE_*` variables)
//! - Direct construction with `new()`
//!
//! Every loader validates before returning, so a [`PeerConfiguration`] in
//! hand is always usable. Peers share it behind an `Arc` and never mutate
//! it.

use std::fs::File;
use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{constants, NetError, Result};
use crate::protocol::discovery::MAX_APP_ID_LENGTH;

/// Default receive/send socket buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 131071;

/// Default pending-connection backlog for listeners.
pub const DEFAULT_BACKLOG: u32 = 16;

/// Default multicast discovery group.
pub const DEFAULT_MULTICAST_ADDRESS: SocketAddrV4 =
    SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 222), 10600);

/// Default prefix for worker thread names.
pub const DEFAULT_THREAD_NAME: &str = "peerwire";

/// Settings shared by a peer, its listener and its discovery socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeerConfiguration {
    /// Application identifier stamped on every discovery datagram
    pub app_identifier: String,

    /// Prefix for the names of the peer's I/O threads
    #[serde(default = "default_thread_name")]
    pub network_thread_name: String,

    /// Port advertised in discovery responses (0 when not listening)
    #[serde(default)]
    pub listening_port: u16,

    #[serde(default = "default_buffer_size")]
    pub receive_buffer_size: usize,

    #[serde(default = "default_buffer_size")]
    pub send_buffer_size: usize,

    /// Listener backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Discovery group address and port
    #[serde(default = "default_multicast_address")]
    pub multicast_address: SocketAddrV4,

    /// Whether the discovery socket joins the group to receive requests
    #[serde(default)]
    pub multicast_listen: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

fn default_multicast_address() -> SocketAddrV4 {
    DEFAULT_MULTICAST_ADDRESS
}

impl PeerConfiguration {
    /// Configuration with defaults for everything but the app identifier.
    pub fn new(app_identifier: impl Into<String>) -> Result<Self> {
        let config = Self::unchecked(app_identifier.into());
        config.validate_strict()?;
        Ok(config)
    }

    fn unchecked(app_identifier: String) -> Self {
        Self {
            app_identifier,
            network_thread_name: default_thread_name(),
            listening_port: 0,
            receive_buffer_size: DEFAULT_BUFFER_SIZE,
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            backlog: DEFAULT_BACKLOG,
            multicast_address: DEFAULT_MULTICAST_ADDRESS,
            multicast_listen: false,
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| NetError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| NetError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config = toml::from_str::<Self>(content)
            .map_err(|e| NetError::ConfigError(format!("Failed to parse TOML: {e}")))?;
        config.validate_strict()?;
        Ok(config)
    }

    /// Defaults for `app_identifier`, overridden by environment variables.
    pub fn from_env(app_identifier: impl Into<String>) -> Result<Self> {
        let mut config = Self::unchecked(app_identifier.into());

        if let Ok(name) = std::env::var("PEERWIRE_THREAD_NAME") {
            config.network_thread_name = name;
        }

        if let Ok(port) = std::env::var("PEERWIRE_LISTENING_PORT") {
            config.listening_port = port
                .parse()
                .map_err(|_| NetError::ConfigError(format!("Invalid listening port: {port}")))?;
        }

        if let Ok(size) = std::env::var("PEERWIRE_BUFFER_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.receive_buffer_size = val;
                config.send_buffer_size = val;
            }
        }

        if let Ok(backlog) = std::env::var("PEERWIRE_BACKLOG") {
            if let Ok(val) = backlog.parse::<u32>() {
                config.backlog = val;
            }
        }

        if let Ok(addr) = std::env::var("PEERWIRE_MULTICAST_ADDRESS") {
            config.multicast_address = addr.parse().map_err(|_| {
                NetError::ConfigError(format!("Invalid multicast address: {addr}"))
            })?;
        }

        if let Ok(listen) = std::env::var("PEERWIRE_MULTICAST_LISTEN") {
            config.multicast_listen = matches!(listen.as_str(), "1" | "true" | "yes");
        }

        config.validate_strict()?;
        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::unchecked("com.example.game".to_string()))
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NetError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| NetError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Multicast group as a socket address.
    pub fn multicast_socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.multicast_address)
    }

    /// Validate the configuration.
    ///
    /// Returns a list of problems. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_identifier.is_empty() {
            errors.push(constants::ERR_EMPTY_APP_ID.to_string());
        } else if self.app_identifier.len() > MAX_APP_ID_LENGTH {
            errors.push(format!(
                "App identifier too long: {} bytes (maximum: {MAX_APP_ID_LENGTH})",
                self.app_identifier.len()
            ));
        }

        if self.network_thread_name.is_empty() {
            errors.push("Network thread name cannot be empty".to_string());
        }

        if self.receive_buffer_size == 0 {
            errors.push("Receive buffer size must be greater than 0".to_string());
        }
        if self.send_buffer_size == 0 {
            errors.push("Send buffer size must be greater than 0".to_string());
        }

        if self.backlog == 0 {
            errors.push("Backlog must be greater than 0".to_string());
        }

        if !self.multicast_address.ip().is_multicast() {
            errors.push(format!(
                "Discovery address is not a multicast group: {}",
                self.multicast_address.ip()
            ));
        }
        if self.multicast_address.port() == 0 {
            errors.push(format!(
                "Discovery {}",
                constants::ERR_PORT_OUT_OF_RANGE.to_lowercase()
            ));
        }

        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(NetError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to emit ANSI colours
    pub ansi: bool,

    /// Whether to include the emitting thread's name
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            ansi: true,
            thread_names: true,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        // Every representable level is valid; kept for symmetry with the
        // other sections.
        Vec::new()
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
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PeerConfiguration::new("com.example.game").unwrap();
        assert_eq!(config.receive_buffer_size, 131071);
        assert_eq!(config.send_buffer_size, 131071);
        assert_eq!(config.backlog, 16);
        assert_eq!(config.multicast_address.to_string(), "239.0.0.222:10600");
        assert!(!config.multicast_listen);
    }

    #[test]
    fn test_app_id_limits() {
        assert!(PeerConfiguration::new("").is_err());
        assert!(PeerConfiguration::new("a".repeat(128)).is_ok());
        assert!(PeerConfiguration::new("a".repeat(129)).is_err());
        // 43 three-byte characters: 129 bytes
        assert!(PeerConfiguration::new("語".repeat(43)).is_err());
        assert!(PeerConfiguration::new("語".repeat(42)).is_ok());
    }

    #[test]
    fn test_toml_partial_fills_defaults() {
        let config = PeerConfiguration::from_toml(
            r#"
            app_identifier = "toml.app"
            listening_port = 7000
            multicast_listen = true

            [logging]
            log_level = "debug"
            ansi = false
            thread_names = false
            "#,
        )
        .unwrap();
        assert_eq!(config.app_identifier, "toml.app");
        assert_eq!(config.listening_port, 7000);
        assert!(config.multicast_listen);
        assert_eq!(config.backlog, DEFAULT_BACKLOG);
        assert_eq!(config.logging.log_level, Level::DEBUG);
    }

    #[test]
    fn test_example_config_parses() {
        let example = PeerConfiguration::example_config();
        let parsed = PeerConfiguration::from_toml(&example).unwrap();
        assert_eq!(parsed.app_identifier, "com.example.game");
    }

    #[test]
    fn test_non_multicast_group_rejected() {
        let mut config = PeerConfiguration::new("app").unwrap();
        config.multicast_address = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 10600);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("not a multicast group"));
    }
}
