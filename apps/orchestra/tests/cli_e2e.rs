use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

struct Sandbox {
  dir: tempfile::TempDir,
  http_port: u16,
}

impl Sandbox {
  fn new() -> Self {
    // Bind and drop to find a port nobody listens on.
    let http_port = std::net::TcpListener::bind("127.0.0.1:0")
      .unwrap()
      .local_addr()
      .unwrap()
      .port();
    Self {
      dir: tempfile::tempdir().unwrap(),
      http_port,
    }
  }

  fn home(&self) -> PathBuf {
    self.dir.path().join("home")
  }

  fn cmd(&self) -> Command {
    let mut cmd = Command::cargo_bin("orchestra").expect("compile bin");
    cmd
      .current_dir(self.dir.path())
      .env("ORCHESTRA_HOME", self.home())
      .env("ORCHESTRA_HTTP_PORT", self.http_port.to_string())
      .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
      .env_remove("ORCHESTRA_SOCKET")
      .env_remove("ORCHESTRA_PID_FILE")
      .env_remove("ORCHESTRA_LOG");
    cmd
  }

  fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
    self.cmd().args(args).assert()
  }
}

impl Drop for Sandbox {
  fn drop(&mut self) {
    if pid_path(&self.home()).exists() {
      let _ = self.cmd().args(["daemon", "stop"]).output();
    }
  }
}

fn pid_path(home: &Path) -> PathBuf {
  home.join("daemon.pid")
}

#[test]
fn commands_without_daemon_explain_how_to_start_it() {
  let sb = Sandbox::new();
  for args in [
    vec!["spawn", "a"],
    vec!["list"],
    vec!["message", "a", "hi"],
  ] {
    sb.run(&args)
      .failure()
      .code(1)
      .stderr(predicate::str::contains("daemon is not running"))
      .stderr(predicate::str::contains("orchestra daemon start"));
  }
  sb.run(&["daemon", "status"])
    .success()
    .stdout(predicate::str::contains("daemon: stopped"));
  sb.run(&["daemon", "stop"])
    .failure()
    .stderr(predicate::str::contains("not running"));
}

#[test]
fn full_agent_lifecycle_through_the_daemon() {
  let sb = Sandbox::new();
  sb.run(&["daemon", "start"])
    .success()
    .stdout(predicate::str::contains("daemon: running"))
    .stdout(predicate::str::contains("health: ok, 0 agents"));
  assert!(pid_path(&sb.home()).exists());
  sb.run(&["daemon", "start"])
    .failure()
    .stderr(predicate::str::contains("already running"));

  sb.run(&["spawn", "bot"])
    .success()
    .stdout(predicate::str::contains("Spawned agent bot"));
  sb.run(&["spawn", "bot"])
    .failure()
    .stderr(predicate::str::contains("already exists"));
  sb.run(&["message", "bot", "hello"])
    .success()
    .stdout(predicate::str::contains("[bot] hello"));
  sb.run(&["list"])
    .success()
    .stdout(predicate::str::contains("bot").and(predicate::str::contains("idle")));
  sb.run(&["info", "bot"])
    .success()
    .stdout(predicate::str::contains("provider: echo"));
  sb.run(&["history", "bot"])
    .success()
    .stdout(predicate::str::contains("[human] hello"))
    .stdout(predicate::str::contains("[bot] hello"));
  sb.run(&["message", "ghost", "hi"])
    .failure()
    .stderr(predicate::str::contains("not found"));

  sb.run(&[
    "spawn",
    "upper",
    "--command",
    "sh",
    "-c",
    "printf '%s' \"$ORCHESTRA_PROMPT\" | tr a-z A-Z",
  ])
  .success();
  sb.run(&["message", "upper", "abc"])
    .success()
    .stdout(predicate::str::contains("[upper] ABC"));
  sb.run(&["list", "--provider", "command"])
    .success()
    .stdout(predicate::str::contains("upper").and(predicate::str::contains("bot").not()));

  sb.run(&["task", "once", "ping"])
    .success()
    .stdout(predicate::str::contains("[once] ping"));

  sb.run(&["shutdown", "bot"])
    .success()
    .stdout(predicate::str::contains("Agent bot shut down."));
  sb.run(&["shutdown", "--all"])
    .success()
    .stdout(predicate::str::contains(
      "Shut down 1 agents. 1 succeeded, 0 failed.",
    ));
  sb.run(&["list"])
    .success()
    .stdout(predicate::str::contains("No agents running."));
  sb.run(&["providers"])
    .success()
    .stdout(predicate::str::contains("echo").and(predicate::str::contains("command")));

  sb.run(&["daemon", "stop"])
    .success()
    .stdout(predicate::str::contains("daemon: stopped"));
  assert!(!pid_path(&sb.home()).exists(), "pid file left behind");
  assert!(!sb.home().join("daemon.sock").exists(), "socket left behind");
  assert!(sb.home().join("logs.jsonl").exists());
}
