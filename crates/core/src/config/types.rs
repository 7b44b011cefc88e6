use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::defaults::{DEFAULT_HTTP_PORT, builtin_commands};

/// Log level for the daemon and CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Off,
  Warn,
  #[default]
  Info,
  Debug,
  Trace,
}

impl LogLevel {
  pub fn as_filter(&self) -> &'static str {
    match self {
      LogLevel::Off => "off",
      LogLevel::Warn => "warn",
      LogLevel::Info => "info",
      LogLevel::Debug => "debug",
      LogLevel::Trace => "trace",
    }
  }
}

/// Where and how the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSettings {
  /// Loopback HTTP port; 0 picks a free port.
  pub http_port: u16,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub socket_path: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pid_path: Option<PathBuf>,
}

impl Default for DaemonSettings {
  fn default() -> Self {
    Self {
      http_port: DEFAULT_HTTP_PORT,
      socket_path: None,
      pid_path: None,
    }
  }
}

/// Command line run by `command` agents that reference it via `preset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPreset {
  pub argv: Vec<String>,
}

/// Effective configuration after merging defaults, global, and project config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  pub log_level: LogLevel,
  /// Provider used by `spawn` when none is given.
  #[serde(default)]
  pub default_provider: Option<String>,
  #[serde(default)]
  pub default_model: Option<String>,
  /// Per-message limit for `command` agents (None means unlimited)
  #[serde(default)]
  pub command_timeout_secs: Option<u64>,
  pub daemon: DaemonSettings,
  pub commands: BTreeMap<String, CommandPreset>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      log_level: LogLevel::Info,
      default_provider: None,
      default_model: None,
      command_timeout_secs: None,
      daemon: DaemonSettings::default(),
      commands: builtin_commands(),
    }
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),
  #[error("toml: {0}")]
  Toml(#[from] toml::de::Error),
  #[error("unsupported platform: no data directory available")]
  UnsupportedPlatform,
  #[error("command preset `{name}` must have a non-empty argv")]
  InvalidCommandPreset { name: String },
  #[error("{var} has invalid value `{value}`")]
  InvalidEnv { var: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
