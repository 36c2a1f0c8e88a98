//! Configuration module for the oneshot-echo server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::protocols::oneshot::{EchoMode, Settings, DEFAULT_ACK, DEFAULT_BUFFER_SIZE};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Readiness backend driving the accept/dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    /// mio readiness (epoll on Linux, kqueue on macOS).
    #[default]
    Mio,
    /// `select(2)` over a fixed-size descriptor bitmask.
    Select,
    /// Sequential accept loop, one connection at a time.
    Blocking,
}

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "oneshot-echo")]
#[command(author = "oneshot-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "A one-shot acknowledge-and-echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8080)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Readiness backend
    #[arg(short = 'r', long, value_enum)]
    pub runtime: Option<RuntimeType>,

    /// Maximum number of simultaneously watched client connections
    #[arg(short = 'm', long)]
    pub max_connections: Option<usize>,

    /// Listen backlog (defaults to SOMAXCONN)
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Receive buffer size in bytes; one byte is reserved
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// How the received payload is echoed back
    #[arg(long, value_enum)]
    pub echo: Option<EchoMode>,

    /// Acknowledgment sent before the payload is read
    #[arg(long)]
    pub ack: Option<String>,

    /// Per-connection send/receive timeout in milliseconds (0 = none)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener and event loop configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub runtime: RuntimeType,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Readiness events drained per poll (mio only)
    #[serde(default = "default_events_capacity")]
    pub events_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            runtime: RuntimeType::default(),
            backlog: default_backlog(),
            max_connections: default_max_connections(),
            events_capacity: default_events_capacity(),
        }
    }
}

/// One-shot exchange configuration
#[derive(Debug, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_ack")]
    pub ack: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub echo: EchoMode,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            ack: default_ack(),
            buffer_size: default_buffer_size(),
            echo: EchoMode::default(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_backlog() -> i32 {
    libc::SOMAXCONN
}

fn default_max_connections() -> usize {
    1024
}

fn default_events_capacity() -> usize {
    256
}

fn default_ack() -> String {
    DEFAULT_ACK.to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub runtime: RuntimeType,
    pub backlog: i32,
    pub max_connections: usize,
    pub events_capacity: usize,
    pub ack: String,
    pub buffer_size: usize,
    pub echo: EchoMode,
    pub timeout_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::empty(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve already-parsed CLI args, reading the TOML file they name.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            runtime: cli.runtime.unwrap_or(toml_config.server.runtime),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            events_capacity: toml_config.server.events_capacity,
            ack: cli.ack.unwrap_or(toml_config.exchange.ack),
            buffer_size: cli.buffer_size.unwrap_or(toml_config.exchange.buffer_size),
            echo: cli.echo.unwrap_or(toml_config.exchange.echo),
            timeout_ms: cli.timeout_ms.unwrap_or(toml_config.exchange.timeout_ms),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size < 2 {
            return Err(ConfigError::Invalid(format!(
                "buffer_size must be at least 2, got {}",
                self.buffer_size
            )));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.events_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for each one-shot exchange.
    pub fn exchange(&self) -> Settings {
        Settings {
            ack: self.ack.as_bytes().to_vec(),
            buffer_size: self.buffer_size,
            echo: self.echo,
        }
    }

    /// Per-connection I/O timeout, `None` when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl CliArgs {
    fn empty() -> Self {
        Self {
            config: None,
            listen: None,
            runtime: None,
            max_connections: None,
            backlog: None,
            buffer_size: None,
            echo: None,
            ack: None,
            timeout_ms: None,
            log_level: default_log_level(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {1}", path = .0.display())]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{path}': {1}", path = .0.display())]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
