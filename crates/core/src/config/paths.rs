use std::env;
use std::path::{Path, PathBuf};

use dirs::data_dir;

use super::types::{Config, ConfigError, Result};

/// Location of the global config file (~/.config/orchestra/config.toml)
pub fn global_config_path() -> Option<PathBuf> {
  dirs::config_dir().map(|p| p.join("orchestra").join("config.toml"))
}

/// Location of the project config file (./.orchestra/config.toml)
pub fn project_config_path(project_root: &Path) -> PathBuf {
  project_root.join(".orchestra").join("config.toml")
}

/// Filesystem and network locations used by the daemon and its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
  pub state_dir: PathBuf,
  pub socket_path: PathBuf,
  pub pid_path: PathBuf,
  pub logs_path: PathBuf,
  pub http_port: u16,
}

/// Resolve runtime locations from `cfg` and the process environment.
pub fn resolve_runtime_paths(cfg: &Config) -> Result<RuntimePaths> {
  resolve_runtime_paths_with(cfg, |key| env::var(key).ok())
}

/// Same as [`resolve_runtime_paths`] with an explicit environment lookup.
///
/// Precedence per item: `ORCHESTRA_*` variable, then config, then a file
/// inside the state dir (`ORCHESTRA_HOME`, default `<data dir>/orchestra`).
pub fn resolve_runtime_paths_with<F>(cfg: &Config, lookup: F) -> Result<RuntimePaths>
where
  F: Fn(&str) -> Option<String>,
{
  let state_dir = match lookup("ORCHESTRA_HOME") {
    Some(home) => PathBuf::from(home),
    None => data_dir()
      .map(|d| d.join("orchestra"))
      .ok_or(ConfigError::UnsupportedPlatform)?,
  };

  let socket_path = lookup("ORCHESTRA_SOCKET")
    .map(PathBuf::from)
    .or_else(|| cfg.daemon.socket_path.clone())
    .unwrap_or_else(|| state_dir.join("daemon.sock"));
  let pid_path = lookup("ORCHESTRA_PID_FILE")
    .map(PathBuf::from)
    .or_else(|| cfg.daemon.pid_path.clone())
    .unwrap_or_else(|| state_dir.join("daemon.pid"));
  let http_port = match lookup("ORCHESTRA_HTTP_PORT") {
    Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnv {
      var: "ORCHESTRA_HTTP_PORT",
      value: raw,
    })?,
    None => cfg.daemon.http_port,
  };

  Ok(RuntimePaths {
    logs_path: state_dir.join("logs.jsonl"),
    state_dir,
    socket_path,
    pid_path,
    http_port,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn files_default_into_home() {
    let paths = resolve_runtime_paths_with(
      &Config::default(),
      lookup_from(&[("ORCHESTRA_HOME", "/tmp/orch")]),
    )
    .unwrap();
    assert_eq!(paths.socket_path, PathBuf::from("/tmp/orch/daemon.sock"));
    assert_eq!(paths.pid_path, PathBuf::from("/tmp/orch/daemon.pid"));
    assert_eq!(paths.logs_path, PathBuf::from("/tmp/orch/logs.jsonl"));
    assert_eq!(paths.http_port, 7862);
  }

  #[test]
  fn env_beats_config() {
    let mut cfg = Config::default();
    cfg.daemon.socket_path = Some(PathBuf::from("/cfg/d.sock"));
    cfg.daemon.http_port = 9000;

    let from_cfg =
      resolve_runtime_paths_with(&cfg, lookup_from(&[("ORCHESTRA_HOME", "/h")])).unwrap();
    assert_eq!(from_cfg.socket_path, PathBuf::from("/cfg/d.sock"));
    assert_eq!(from_cfg.http_port, 9000);

    let from_env = resolve_runtime_paths_with(
      &cfg,
      lookup_from(&[
        ("ORCHESTRA_HOME", "/h"),
        ("ORCHESTRA_SOCKET", "/env/d.sock"),
        ("ORCHESTRA_PID_FILE", "/env/d.pid"),
        ("ORCHESTRA_HTTP_PORT", "0"),
      ]),
    )
    .unwrap();
    assert_eq!(from_env.socket_path, PathBuf::from("/env/d.sock"));
    assert_eq!(from_env.pid_path, PathBuf::from("/env/d.pid"));
    assert_eq!(from_env.http_port, 0);
  }

  #[test]
  fn bad_port_is_reported() {
    let err = resolve_runtime_paths_with(
      &Config::default(),
      lookup_from(&[("ORCHESTRA_HOME", "/h"), ("ORCHESTRA_HTTP_PORT", "http")]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("ORCHESTRA_HTTP_PORT"));
  }
}
