use super::types::{Config, ConfigError, Result};

pub(super) fn validate_commands(cfg: &Config) -> Result<()> {
  for (name, preset) in &cfg.commands {
    if preset.argv.first().is_none_or(|program| program.trim().is_empty()) {
      return Err(ConfigError::InvalidCommandPreset {
        name: name.to_string(),
      });
    }
  }
  Ok(())
}
