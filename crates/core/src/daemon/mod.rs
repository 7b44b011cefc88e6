//! The daemon hosts one engine and serves it over a Unix socket and a
//! loopback HTTP port at the same time. Both transports start and stop as a
//! unit; a PID file and the socket file advertise the running process.

use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::config::RuntimePaths;
use crate::engine::OrchestrationEngine;

pub mod api;
pub mod pidfile;
mod server;

use api::{DaemonContext, build_module};
use pidfile::PidState;

#[derive(Debug, Error)]
pub enum DaemonError {
  #[error("daemon already running (pid {pid})")]
  AlreadyRunning { pid: i32 },
  #[error("daemon is not running")]
  NotRunning,
  #[error("failed to bind {transport} listener at {target}: {source}")]
  Bind {
    transport: &'static str,
    target: String,
    #[source]
    source: io::Error,
  },
  #[error("io: {0}")]
  Io(#[from] io::Error),
}

/// Where the daemon listens and records its pid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
  pub socket_path: PathBuf,
  pub pid_path: PathBuf,
  /// 0 binds an ephemeral port; see [`DaemonHandle::http_addr`].
  pub http_port: u16,
}

impl DaemonConfig {
  pub fn from_paths(paths: &RuntimePaths) -> Self {
    Self {
      socket_path: paths.socket_path.clone(),
      pid_path: paths.pid_path.clone(),
      http_port: paths.http_port,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonPhase {
  Starting,
  Running,
  Stopping,
  Stopped,
}

/// Handle to the running daemon server.
pub struct DaemonHandle {
  task: JoinHandle<()>,
  socket_path: PathBuf,
  http_addr: SocketAddr,
  shutdown_tx: watch::Sender<bool>,
  phase_rx: watch::Receiver<DaemonPhase>,
}

impl DaemonHandle {
  pub fn socket_path(&self) -> &Path {
    &self.socket_path
  }

  pub fn http_addr(&self) -> SocketAddr {
    self.http_addr
  }

  pub fn phase(&self) -> DaemonPhase {
    *self.phase_rx.borrow()
  }

  /// Ask for a graceful shutdown. Repeated requests are harmless.
  pub fn request_shutdown(&self) {
    let _ = self.shutdown_tx.send(true);
  }

  /// Await the daemon task to finish (e.g., after shutdown).
  pub async fn wait(self) {
    if let Err(e) = self.task.await {
      error!(error = %e, "daemon supervisor panicked");
    }
  }
}

/// Start serving `engine`. Refuses to start while a live process holds the
/// PID file; a stale PID file is cleared.
pub async fn start(
  config: DaemonConfig,
  engine: Arc<OrchestrationEngine>,
) -> Result<DaemonHandle, DaemonError> {
  let (phase_tx, phase_rx) = watch::channel(DaemonPhase::Starting);

  match pidfile::inspect(&config.pid_path)? {
    PidState::Running(pid) => return Err(DaemonError::AlreadyRunning { pid }),
    PidState::Stale(pid) => {
      warn!(event = "daemon_stale_pid", pid = ?pid, path = %config.pid_path.display(), "removing stale pid file");
      fs::remove_file(&config.pid_path)?;
    }
    PidState::Absent => {}
  }

  let listeners = server::bind(&config.socket_path, config.http_port).await?;
  let own_pid = std::process::id();
  if let Err(e) = pidfile::write(&config.pid_path, own_pid) {
    let _ = fs::remove_file(&config.socket_path);
    return Err(e.into());
  }

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let module = build_module(DaemonContext {
    engine: engine.clone(),
    socket_path: config.socket_path.clone(),
    http_addr: listeners.http_addr,
    shutdown_tx: shutdown_tx.clone(),
  });

  info!(
    event = "daemon_started",
    socket = %config.socket_path.display(),
    http = %listeners.http_addr,
    pid = own_pid,
    "daemon started"
  );

  let http_addr = listeners.http_addr;
  let socket_path = config.socket_path.clone();
  let (stop_tx, stop_rx) = watch::channel(false);
  let mut transports = JoinSet::new();
  transports.spawn(server::serve(
    "unix",
    listeners.unix,
    module.clone(),
    stop_rx.clone(),
  ));
  transports.spawn(server::serve("http", listeners.tcp, module, stop_rx));
  let task = tokio::spawn(supervise(
    config,
    engine,
    transports,
    stop_tx,
    shutdown_rx,
    phase_tx,
  ));

  Ok(DaemonHandle {
    task,
    socket_path,
    http_addr,
    shutdown_tx,
    phase_rx,
  })
}

/// Waits for a shutdown request or for either transport to end, then tears
/// everything down: agents, the remaining transport, socket, PID file.
async fn supervise(
  config: DaemonConfig,
  engine: Arc<OrchestrationEngine>,
  mut transports: JoinSet<io::Result<()>>,
  stop_tx: watch::Sender<bool>,
  mut shutdown_rx: watch::Receiver<bool>,
  phase_tx: watch::Sender<DaemonPhase>,
) {
  let _ = phase_tx.send(DaemonPhase::Running);

  tokio::select! {
    _ = wait_for_flag(&mut shutdown_rx) => {
      info!(event = "daemon_shutdown", "shutdown requested; stopping");
    }
    res = transports.join_next() => {
      // One transport ended on its own; take the other down with it.
      error!(event = "daemon_transport_exited", result = ?res, "transport exited unexpectedly");
    }
  }

  let _ = phase_tx.send(DaemonPhase::Stopping);
  let report = engine.shutdown_all().await;
  if !report.is_clean() {
    warn!(event = "daemon_agents_failed_shutdown", failed = ?report.failed, "some agents failed to shut down");
  }

  let _ = stop_tx.send(true);
  while transports.join_next().await.is_some() {}

  // The pid file goes last; `daemon stop` waits on it.
  let _ = fs::remove_file(&config.socket_path);
  if let Err(e) = pidfile::remove_if_owned(&config.pid_path, std::process::id()) {
    warn!(error = %e, path = %config.pid_path.display(), "failed to remove pid file");
  }
  let _ = phase_tx.send(DaemonPhase::Stopped);
  info!(event = "daemon_stopped", socket = %config.socket_path.display(), "daemon stopped");
}

/// Resolves once the flag is set or every sender is gone.
async fn wait_for_flag(rx: &mut watch::Receiver<bool>) {
  while !*rx.borrow_and_update() {
    if rx.changed().await.is_err() {
      return;
    }
  }
}

/// Run the daemon in the foreground until SIGTERM, SIGINT, or a remote
/// shutdown request. Signals only set the shutdown flag, so the graceful
/// sequence runs once however many arrive.
pub async fn run(
  config: DaemonConfig,
  engine: Arc<OrchestrationEngine>,
) -> Result<(), DaemonError> {
  use tokio::signal::unix::{SignalKind, signal};

  let mut sigterm = signal(SignalKind::terminate())?;
  let mut sigint = signal(SignalKind::interrupt())?;
  let handle = start(config, engine).await?;
  let shutdown_tx = handle.shutdown_tx.clone();

  let signals = tokio::spawn(async move {
    loop {
      tokio::select! {
        _ = sigterm.recv() => info!(event = "daemon_signal", signal = "SIGTERM", "termination signal received"),
        _ = sigint.recv() => info!(event = "daemon_signal", signal = "SIGINT", "interrupt signal received"),
      }
      let _ = shutdown_tx.send(true);
    }
  });

  handle.wait().await;
  signals.abort();
  Ok(())
}
