//! # Configuration Management
//!
//! Per-connection configuration: the connection's default send/receive
//! options, limits for payload processing, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`

use crate::core::options::SendReceiveOptions;
use crate::core::serialization::SerializerKind;
use crate::error::{DispatchError, Result};
use crate::utils::compression::ProcessorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Max allowed payload size (e.g. 16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Zstd level used when none is configured
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Top-level configuration for one connection
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConnectionConfig {
    /// Default send/receive options for packet types without their own
    #[serde(default)]
    pub options: OptionsConfig,

    /// Payload processing limits
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConnectionConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("PEER_DISPATCH_SERIALIZER") {
            config.options.serializer = parse_serializer(&name)?;
        }

        if let Ok(list) = std::env::var("PEER_DISPATCH_PROCESSORS") {
            config.options.processors = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_processor)
                .collect::<Result<Vec<_>>>()?;
        }

        if let Ok(size) = std::env::var("PEER_DISPATCH_MAX_PAYLOAD_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.processing.max_payload_size = val;
            }
        }

        if let Ok(level) = std::env::var("PEER_DISPATCH_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.options.validate());
        errors.extend(self.processing.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_serializer(name: &str) -> Result<SerializerKind> {
    match name.to_ascii_lowercase().as_str() {
        "bincode" => Ok(SerializerKind::Bincode),
        "json" => Ok(SerializerKind::Json),
        "messagepack" | "msgpack" => Ok(SerializerKind::MessagePack),
        other => Err(DispatchError::ConfigError(format!(
            "Unknown serializer: '{other}'"
        ))),
    }
}

fn parse_processor(name: &str) -> Result<ProcessorKind> {
    match name.to_ascii_lowercase().as_str() {
        "lz4" => Ok(ProcessorKind::Lz4),
        "zstd" => Ok(ProcessorKind::Zstd),
        "chacha20poly1305" => Ok(ProcessorKind::ChaCha20Poly1305),
        other => Err(DispatchError::ConfigError(format!(
            "Unknown processor: '{other}'"
        ))),
    }
}

/// Default send/receive options of a connection
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OptionsConfig {
    /// Serializer used when a packet type has no options of its own
    #[serde(default)]
    pub serializer: SerializerKind,

    /// Processors applied after serialization, in order
    #[serde(default)]
    pub processors: Vec<ProcessorKind>,

    /// Free-form option map passed to serializers and processors
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl OptionsConfig {
    /// Build the connection default `SendReceiveOptions`
    pub fn default_options(&self) -> SendReceiveOptions {
        SendReceiveOptions::from_parts(
            Some(self.serializer),
            Some(self.processors.clone()),
            self.options.clone(),
        )
    }

    /// Validate default options
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.default_options().validate() {
            errors.push(format!("Default options: {e}"));
        }

        errors
    }
}

/// Limits applied while encoding and decoding payloads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Maximum payload size in bytes, before and after decompression
    pub max_payload_size: usize,

    /// Zstd compression level
    pub compression_level: i32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ProcessingConfig {
    /// Validate processing configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size < 1024 {
            errors.push("Max payload size too small (minimum: 1 KB)".to_string());
        } else if self.max_payload_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_payload_size
            ));
        }

        if self.compression_level < 1 || self.compression_level > 22 {
            errors.push(format!(
                "Invalid compression level: {} (valid range: 1-22)",
                self.compression_level
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("peer-dispatch"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
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
        level.as_str().to_ascii_lowercase().serialize(serializer)
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
