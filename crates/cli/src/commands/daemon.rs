use std::path::Path;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use orchestra_core::config::RuntimePaths;
use orchestra_core::daemon::{self, DaemonConfig, DaemonError, pidfile, pidfile::PidState};
use orchestra_core::engine::shared_engine;
use tracing::{info, warn};
use yansi::Paint;

use crate::rpc::client::DaemonClient;
use crate::util::daemon_proc::{
  current_thread_rt, resolve_or_exit, spawn_daemon_background, wait_until_healthy,
};

async fn print_status_with(client: &DaemonClient) -> bool {
  match client.status().await {
    Ok(status) => {
      println!(
        "daemon: {} (v{}, pid {}, socket {}, http {})",
        "running".green(),
        status.version,
        status.pid,
        status.socket_path,
        status.http_addr
      );
      if let Ok(health) = client.health().await {
        println!("health: {}, {} agents", health.status, health.agents);
      }
      true
    }
    Err(_) => {
      println!("daemon: stopped");
      false
    }
  }
}

pub fn print_status() {
  let (_, paths) = resolve_or_exit();
  let client = DaemonClient::from_paths(&paths);
  current_thread_rt().block_on(print_status_with(&client));
}

pub fn run_daemon_foreground() {
  let (cfg, paths) = resolve_or_exit();
  let rt = tokio::runtime::Builder::new_multi_thread()
    .enable_io()
    .enable_time()
    .worker_threads(2)
    .build()
    .expect("build tokio runtime");
  let engine = shared_engine(&cfg);
  let res = rt.block_on(daemon::run(DaemonConfig::from_paths(&paths), engine));
  match res {
    Ok(()) => info!(event = "daemon_exit", "daemon exited"),
    Err(DaemonError::AlreadyRunning { pid }) => {
      eprintln!("daemon already running (pid {pid})");
      std::process::exit(1);
    }
    Err(e) => {
      eprintln!("failed to start daemon: {e}");
      std::process::exit(1);
    }
  }
}

/// Polls, 100ms apart, that `stop` makes before giving up on the daemon.
const STOP_ATTEMPTS: u32 = 100;

fn running_pid(paths: &RuntimePaths) -> Option<i32> {
  match pidfile::inspect(&paths.pid_path) {
    Ok(PidState::Running(pid)) => Some(pid),
    _ => None,
  }
}

pub fn start_daemon() {
  let (_, paths) = resolve_or_exit();
  if let Some(pid) = running_pid(&paths) {
    eprintln!("daemon already running (pid {pid})");
    std::process::exit(1);
  }

  if let Err(e) = spawn_daemon_background(&paths) {
    eprintln!("failed to start daemon: {e}");
    std::process::exit(1);
  }

  let client = DaemonClient::from_paths(&paths);
  let rt = current_thread_rt();
  let up = rt.block_on(async {
    wait_until_healthy(&client, 50).await && print_status_with(&client).await
  });
  if !up {
    eprintln!("daemon did not come up; see {}", paths.logs_path.display());
    std::process::exit(1);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopOutcome {
  NotRunning,
  Stopped,
  /// Still alive when the wait ran out.
  TimedOut(i32),
}

/// Wait until `pid` is gone or no longer holds the PID file.
async fn wait_for_exit(pid: i32, pid_path: &Path, attempts: u32, interval: Duration) -> bool {
  for _ in 0..attempts {
    let holds_pidfile = matches!(pidfile::inspect(pid_path), Ok(PidState::Running(p)) if p == pid);
    if !pidfile::is_alive(pid) || !holds_pidfile {
      return true;
    }
    tokio::time::sleep(interval).await;
  }
  false
}

fn stop_inner(paths: &RuntimePaths) -> StopOutcome {
  let Some(pid) = running_pid(paths) else {
    return StopOutcome::NotRunning;
  };

  let client = DaemonClient::from_paths(paths);
  let rt = current_thread_rt();
  let exited = rt.block_on(async {
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
      warn!(event = "daemon_stop_signal_failed", error = %e, pid, "asking over rpc instead");
      let _ = client.shutdown_daemon().await;
    }
    wait_for_exit(pid, &paths.pid_path, STOP_ATTEMPTS, Duration::from_millis(100)).await
  });
  if exited {
    StopOutcome::Stopped
  } else {
    StopOutcome::TimedOut(pid)
  }
}

fn report_stop_timeout(pid: i32) -> ! {
  eprintln!(
    "daemon (pid {pid}) is still shutting down after {}s; agents may be slow to stop",
    STOP_ATTEMPTS / 10
  );
  std::process::exit(1);
}

pub fn stop_daemon() {
  let (_, paths) = resolve_or_exit();
  match stop_inner(&paths) {
    StopOutcome::NotRunning => {
      eprintln!("daemon is not running");
      std::process::exit(1);
    }
    StopOutcome::TimedOut(pid) => report_stop_timeout(pid),
    StopOutcome::Stopped => println!("daemon: stopped"),
  }
}

pub fn restart_daemon() {
  let (_, paths) = resolve_or_exit();
  if let StopOutcome::TimedOut(pid) = stop_inner(&paths) {
    report_stop_timeout(pid);
  }
  start_daemon();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn wait_gives_up_while_the_pid_file_is_held() {
    let td = tempfile::tempdir().unwrap();
    let pid_path = td.path().join("daemon.pid");
    let own = std::process::id();
    pidfile::write(&pid_path, own).unwrap();
    let done = wait_for_exit(own as i32, &pid_path, 3, Duration::from_millis(10)).await;
    assert!(!done);
  }

  #[tokio::test]
  async fn wait_ends_once_the_pid_file_is_gone() {
    let td = tempfile::tempdir().unwrap();
    let pid_path = td.path().join("daemon.pid");
    let own = std::process::id();
    pidfile::write(&pid_path, own).unwrap();
    let remover = {
      let pid_path = pid_path.clone();
      tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        std::fs::remove_file(pid_path).unwrap();
      })
    };
    let done = wait_for_exit(own as i32, &pid_path, 100, Duration::from_millis(10)).await;
    remover.await.unwrap();
    assert!(done);
  }
}
