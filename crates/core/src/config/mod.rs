//! Layered TOML configuration: built-in defaults, then the global file,
//! then the project file. Runtime locations come from the merged config plus
//! `ORCHESTRA_*` environment overrides.

mod defaults;
mod load;
mod paths;
mod types;
mod validate;

pub use defaults::{DEFAULT_HTTP_PORT, builtin_commands};
pub use load::load;
pub use paths::{
  RuntimePaths, global_config_path, project_config_path, resolve_runtime_paths,
  resolve_runtime_paths_with,
};
pub use types::{CommandPreset, Config, ConfigError, DaemonSettings, LogLevel, Result};
