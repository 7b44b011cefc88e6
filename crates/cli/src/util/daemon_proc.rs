use std::path::PathBuf;
use std::time::Duration;

use orchestra_core::config::{self, Config, RuntimePaths};

use crate::rpc::client::DaemonClient;

/// Effective config and runtime locations for this invocation.
pub fn resolve() -> Result<(Config, RuntimePaths), config::ConfigError> {
  let cwd = std::env::current_dir().ok();
  let cfg = config::load(cwd.as_deref())?;
  let paths = config::resolve_runtime_paths(&cfg)?;
  Ok((cfg, paths))
}

/// Like [`resolve`], but exits with a message when config is broken.
pub fn resolve_or_exit() -> (Config, RuntimePaths) {
  match resolve() {
    Ok(v) => v,
    Err(e) => {
      eprintln!("config error: {e}");
      std::process::exit(1);
    }
  }
}

pub fn client() -> DaemonClient {
  let (_, paths) = resolve_or_exit();
  DaemonClient::from_paths(&paths)
}

pub fn current_thread_rt() -> tokio::runtime::Runtime {
  tokio::runtime::Builder::new_current_thread()
    .enable_io()
    .enable_time()
    .build()
    .expect("build tokio runtime")
}

/// Launch `orchestra daemon run` detached, pinned to the resolved paths.
pub fn spawn_daemon_background(paths: &RuntimePaths) -> std::io::Result<()> {
  let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("orchestra"));
  let mut cmd = std::process::Command::new(exe);
  cmd.arg("daemon").arg("run");
  cmd.env("ORCHESTRA_HOME", &paths.state_dir);
  cmd.env("ORCHESTRA_SOCKET", &paths.socket_path);
  cmd.env("ORCHESTRA_PID_FILE", &paths.pid_path);
  cmd.env("ORCHESTRA_HTTP_PORT", paths.http_port.to_string());
  cmd
    .stdin(std::process::Stdio::null())
    .stdout(std::process::Stdio::null())
    .stderr(std::process::Stdio::null());
  let _ = cmd.spawn()?;
  Ok(())
}

/// Poll `daemon.health` until it answers or `attempts` run out.
pub async fn wait_until_healthy(client: &DaemonClient, attempts: u32) -> bool {
  for _ in 0..attempts {
    if client.health().await.is_ok() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
  }
  false
}
