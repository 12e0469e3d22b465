//! # Configuration Management
//!
//! Centralized configuration for the media transfer server and client.
//!
//! A [`TransferConfig`] is built once at startup and handed by reference to
//! the components that need it. Nothing in the crate reads configuration from
//! global state.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `load_or_default()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` / `apply_env()`
//!
//! ## Example
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! tcp_port = 8080
//! udp_port = 8000
//!
//! [transport]
//! chunk_size = 1024
//!
//! [[storage.categories]]
//! name = "Texts"
//! path = "Multimedia/Texts"
//! extensions = [".txt", ".md"]
//! ```

use crate::error::{constants, Result, TransferError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Default chunk size for datagram transfers
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

/// Default cap on the declared file name length
pub const DEFAULT_MAX_FILE_NAME_LEN: usize = 255;

/// Default cap on the declared payload length (1 GiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TransferConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Sender configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Wire-level limits and chunking
    #[serde(default)]
    pub transport: TransportConfig,

    /// Classification table and storage roots
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TransferConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            TransferError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_OPEN))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| TransferError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist. A file that exists but cannot be parsed is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match std::fs::metadata(path.as_ref()) {
            Ok(_) => Self::from_file(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(TransferError::ConfigError(format!(
                "{}: {e}",
                constants::ERR_CONFIG_OPEN
            ))),
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content).map_err(|e| {
            TransferError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_PARSE))
        })
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `MEDIA_TRANSFER_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("MEDIA_TRANSFER_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }

        if let Ok(port) = std::env::var("MEDIA_TRANSFER_TCP_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                self.server.tcp_port = val;
            }
        }

        if let Ok(port) = std::env::var("MEDIA_TRANSFER_UDP_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                self.server.udp_port = val;
            }
        }

        if let Ok(size) = std::env::var("MEDIA_TRANSFER_CHUNK_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                self.transport.chunk_size = val;
            }
        }
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

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TransferError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn validate_host(label: &str, host: &str, errors: &mut Vec<String>) {
    if host.is_empty() {
        errors.push(format!("{label} host cannot be empty"));
    } else if host.chars().any(char::is_whitespace) {
        errors.push(format!("{label} host contains whitespace: '{host}'"));
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host or IP both listeners bind to
    pub host: String,

    /// TCP listen port
    pub tcp_port: u16,

    /// UDP listen port
    pub udp_port: u16,

    /// Requested OS receive buffer for the UDP socket, in bytes
    pub recv_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            tcp_port: 8080,
            udp_port: 8000,
            recv_buffer_size: 4 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` for the TCP listener
    pub fn tcp_address(&self) -> String {
        join_host_port(&self.host, self.tcp_port)
    }

    /// `host:port` for the UDP listener
    pub fn udp_address(&self) -> String {
        join_host_port(&self.host, self.udp_port)
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        validate_host("Server", &self.host, &mut errors);

        if self.tcp_port == 0 {
            errors.push("Server TCP port must be greater than 0".to_string());
        }
        if self.udp_port == 0 {
            errors.push("Server UDP port must be greater than 0".to_string());
        }

        if self.recv_buffer_size < 64 * 1024 {
            errors.push("UDP receive buffer too small (minimum: 64 KB)".to_string());
        } else if self.recv_buffer_size > 256 * 1024 * 1024 {
            errors.push(format!(
                "UDP receive buffer too large: {} bytes (maximum: 256 MB)",
                self.recv_buffer_size
            ));
        }

        errors
    }
}

/// Which transport a sender uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Reliable, ordered byte stream
    #[default]
    Tcp,
    /// Chunked datagrams
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => f.write_str("tcp"),
            TransportKind::Udp => f.write_str("udp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            other => Err(TransferError::ConfigError(format!(
                "Unknown transport '{other}' (expected 'tcp' or 'udp')"
            ))),
        }
    }
}

/// Sender configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Receiver host or IP
    pub host: String,

    /// Receiver port
    pub port: u16,

    /// Transport to send over
    pub transport: TransportKind,

    /// How long to wait for the status byte. `None` waits indefinitely.
    #[serde(with = "opt_duration_serde", skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 8080,
            transport: TransportKind::Tcp,
            response_timeout: None,
        }
    }
}

impl ClientConfig {
    /// `host:port` of the receiver
    pub fn address(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        validate_host("Client", &self.host, &mut errors);

        if self.port == 0 {
            errors.push("Client port must be greater than 0".to_string());
        }

        if let Some(timeout) = self.response_timeout {
            if timeout.as_millis() < 100 {
                errors.push("Response timeout too short (minimum: 100ms)".to_string());
            }
        }

        errors
    }
}

/// Wire-level limits and chunking
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Payload bytes per datagram on the UDP path
    pub chunk_size: usize,

    /// Largest file name a receiver will accept
    pub max_file_name_len: usize,

    /// Largest payload a receiver will accept
    pub max_payload_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_name_len: DEFAULT_MAX_FILE_NAME_LEN,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.chunk_size == 0 {
            errors.push("Chunk size must be greater than 0".to_string());
        } else if self.chunk_size > MAX_DATAGRAM_PAYLOAD {
            errors.push(format!(
                "Chunk size too large: {} bytes (maximum: {MAX_DATAGRAM_PAYLOAD})",
                self.chunk_size
            ));
        }

        if self.max_file_name_len == 0 {
            errors.push("Max file name length must be greater than 0".to_string());
        } else if self.max_file_name_len > 4096 {
            errors.push(format!(
                "Max file name length too large: {} (maximum: 4096)",
                self.max_file_name_len
            ));
        }

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size as u64 > u64::from(u32::MAX) {
            errors.push(format!(
                "Max payload size too large: {} bytes (wire limit: {})",
                self.max_payload_size,
                u32::MAX
            ));
        }

        errors
    }
}

/// One storage category: where files with these extensions are written
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Display name, e.g. "Images"
    pub name: String,

    /// Directory, relative to the storage root unless absolute
    pub path: PathBuf,

    /// Extensions including the leading dot, e.g. ".png"
    pub extensions: Vec<String>,
}

impl CategoryConfig {
    fn new(name: &str, path: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            path: PathBuf::from(path),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Classification table and storage root
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the category paths are resolved against
    pub root: PathBuf,

    /// Category table; an extension may appear in at most one category
    pub categories: Vec<CategoryConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            categories: vec![
                CategoryConfig::new("Images", "Multimedia/Images", &[".jpg", ".jpeg", ".png"]),
                CategoryConfig::new("Audios", "Multimedia/Audios", &[".mp3", ".wav", ".mid"]),
                CategoryConfig::new("Videos", "Multimedia/Videos", &[".mp4", ".avi", ".flv"]),
                CategoryConfig::new("Texts", "Multimedia/Texts", &[".txt"]),
            ],
        }
    }
}

impl StorageConfig {
    /// Validate the category table
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.categories.is_empty() {
            errors.push("At least one storage category must be configured".to_string());
        }

        let mut owners: HashMap<String, &str> = HashMap::new();
        for category in &self.categories {
            if category.name.is_empty() {
                errors.push("Storage category name cannot be empty".to_string());
            }
            if category.path.as_os_str().is_empty() {
                errors.push(format!("Storage path for '{}' cannot be empty", category.name));
            }
            if category.extensions.is_empty() {
                errors.push(format!("Category '{}' has no extensions", category.name));
            }

            for ext in &category.extensions {
                if ext.len() < 2 || !ext.starts_with('.') {
                    errors.push(format!(
                        "Invalid extension '{ext}' in '{}' (expected format: '.png')",
                        category.name
                    ));
                    continue;
                }
                let key = ext.to_ascii_lowercase();
                if let Some(owner) = owners.insert(key, &category.name) {
                    errors.push(format!(
                        "Extension '{ext}' is listed in both '{owner}' and '{}'",
                        category.name
                    ));
                }
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
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
            app_name: String::from("media-transfer"),
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

fn join_host_port(host: &str, port: u16) -> String {
    // Bare IPv6 literals need brackets to be parsed back as host:port
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Helper module for optional Duration fields stored as milliseconds
mod opt_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.filter(|m| *m > 0).map(Duration::from_millis))
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
