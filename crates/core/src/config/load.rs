use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::paths::{global_config_path, project_config_path};
use super::types::{CommandPreset, Config, DaemonSettings, LogLevel, Result};
use super::validate::validate_commands;

/// Load configuration by resolving the default global and project paths.
/// Project config overrides global; both override defaults.
pub fn load(project_root: Option<&Path>) -> Result<Config> {
  let global = global_config_path();
  let project = project_root.map(project_config_path);
  load_from_paths(global.as_deref(), project.as_deref())
}

/// Load configuration from explicit file paths (if present).
pub(crate) fn load_from_paths(global: Option<&Path>, project: Option<&Path>) -> Result<Config> {
  let mut cfg = Config::default();

  for path in [global, project].into_iter().flatten() {
    if let Ok(s) = fs::read_to_string(path) {
      let partial: PartialConfig = toml::from_str(&s)?;
      cfg = partial.merge_over(cfg);
    }
  }

  validate_commands(&cfg)?;

  Ok(cfg)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
struct PartialDaemonSettings {
  pub http_port: Option<u16>,
  pub socket_path: Option<PathBuf>,
  pub pid_path: Option<PathBuf>,
}

impl PartialDaemonSettings {
  fn merge_over(self, base: DaemonSettings) -> DaemonSettings {
    DaemonSettings {
      http_port: self.http_port.unwrap_or(base.http_port),
      socket_path: self.socket_path.or(base.socket_path),
      pid_path: self.pid_path.or(base.pid_path),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
struct PartialConfig {
  pub log_level: Option<LogLevel>,
  pub default_provider: Option<String>,
  pub default_model: Option<String>,
  pub command_timeout_secs: Option<u64>,
  pub daemon: Option<PartialDaemonSettings>,
  pub commands: Option<BTreeMap<String, CommandPreset>>,
}

impl PartialConfig {
  fn merge_over(self, base: Config) -> Config {
    let PartialConfig {
      log_level,
      default_provider,
      default_model,
      command_timeout_secs,
      daemon,
      commands,
    } = self;

    let mut merged_commands = base.commands;
    if let Some(overrides) = commands {
      merged_commands.extend(overrides);
    }

    Config {
      log_level: log_level.unwrap_or(base.log_level),
      default_provider: default_provider.or(base.default_provider),
      default_model: default_model.or(base.default_model),
      command_timeout_secs: command_timeout_secs.or(base.command_timeout_secs),
      daemon: daemon.unwrap_or_default().merge_over(base.daemon),
      commands: merged_commands,
    }
  }
}
