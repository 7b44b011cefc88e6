use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use orchestra_core::daemon::{DaemonError, DaemonHandle, DaemonPhase};
use orchestra_core::domain::{AgentInfo, AgentState, ShutdownReport};
use orchestra_core::logging;
use orchestra_core::rpc::{
  AgentListResponse, DaemonStatus, ErrorKind, Health, MessagesResponse, ProviderListResponse,
};
use serde_json::{Value, json};
use test_support::{
  HttpRpcClient, MockProvider, RpcResp, TempHome, UnixRpcClient, mock_engine, poll_until,
  start_daemon,
};

static LOG_DIR: OnceLock<tempfile::TempDir> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

fn ensure_logging_once() -> PathBuf {
  if let Some(p) = LOG_PATH.get() {
    return p.clone();
  }
  let td = tempfile::tempdir().unwrap();
  let log_path = td.path().join("logs.jsonl");
  logging::init(&log_path, orchestra_core::config::LogLevel::Info).unwrap();
  let _ = LOG_DIR.set(td);
  let _ = LOG_PATH.set(log_path.clone());
  log_path
}

struct TestEnv {
  home: TempHome,
  mock: std::sync::Arc<MockProvider>,
  handle: DaemonHandle,
}

impl TestEnv {
  async fn start() -> Self {
    ensure_logging_once();
    let home = TempHome::new();
    let mock = MockProvider::new();
    let handle = start_daemon(&home, mock_engine(mock.clone())).await;
    Self { home, mock, handle }
  }

  fn unix(&self) -> UnixRpcClient {
    UnixRpcClient::new(self.handle.socket_path())
  }

  fn http(&self) -> HttpRpcClient {
    HttpRpcClient::new(self.handle.http_addr())
  }

  async fn stop(self) {
    let pid_path = self.home.pid_path();
    let sock = self.home.socket_path();
    self.handle.request_shutdown();
    self.handle.wait().await;
    assert!(!pid_path.exists(), "pid file left behind");
    assert!(!sock.exists(), "socket file left behind");
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn daemon_status_roundtrip() {
  let env = TestEnv::start().await;
  let v: RpcResp<DaemonStatus> = env.unix().call("daemon.status", None).await;
  assert_eq!(v.jsonrpc, "2.0");
  assert!(v.error.is_none(), "unexpected error: {:?}", v.error);
  let status = v.result.expect("has result");
  assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
  assert_eq!(status.pid, std::process::id());
  assert_eq!(status.socket_path, env.home.socket_path().display().to_string());
  assert_eq!(status.http_addr, env.handle.http_addr().to_string());

  let pid = std::fs::read_to_string(env.home.pid_path()).unwrap();
  assert_eq!(pid.trim(), std::process::id().to_string());
  assert_eq!(env.handle.phase(), DaemonPhase::Running);
  env.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn both_transports_share_one_engine() {
  let env = TestEnv::start().await;
  let (unix, http) = (env.unix(), env.http());

  let spawned: RpcResp<AgentInfo> = unix
    .call("agent.spawn", Some(json!({ "name": "a", "provider": "mock" })))
    .await;
  let info = spawned.result.expect("spawned");
  assert_eq!(info.name, "a");
  assert_eq!(info.state, AgentState::Idle);

  let listed: RpcResp<AgentListResponse> = http.call("agent.list", None).await;
  let agents = listed.result.expect("list").agents;
  assert_eq!(agents.len(), 1);
  assert_eq!(agents[0].name, "a");

  let replies: RpcResp<MessagesResponse> = http
    .call("agent.message", Some(json!({ "name": "a", "content": "hello" })))
    .await;
  let replies = replies.result.expect("replies").messages;
  assert_eq!(replies.len(), 1);
  assert_eq!(replies[0].content, "echo: hello");

  let history: RpcResp<MessagesResponse> = unix
    .call("agent.history", Some(json!({ "name": "a" })))
    .await;
  let history = history.result.expect("history").messages;
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].sender, "human");

  let health: RpcResp<Health> = http.call("daemon.health", None).await;
  assert_eq!(
    health.result.expect("health"),
    Health {
      status: "ok".into(),
      agents: 1
    }
  );
  env.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_errors_carry_distinct_codes() {
  let env = TestEnv::start().await;
  let unix = env.unix();

  let missing: RpcResp<Value> = unix.call("agent.get", Some(json!({ "name": "ghost" }))).await;
  let err = missing.error.expect("not found");
  assert_eq!(ErrorKind::from_code(err.code), ErrorKind::NotFound);
  assert_eq!(err.data.expect("data")["kind"], "not_found");

  let _: RpcResp<Value> = unix
    .call("agent.spawn", Some(json!({ "name": "a", "provider": "mock" })))
    .await;
  let dup: RpcResp<Value> = unix
    .call("agent.spawn", Some(json!({ "name": "a", "provider": "mock" })))
    .await;
  assert_eq!(
    ErrorKind::from_code(dup.error.expect("conflict").code),
    ErrorKind::AlreadyExists
  );

  let unknown: RpcResp<Value> = unix
    .call("agent.spawn", Some(json!({ "name": "b", "provider": "nope" })))
    .await;
  let err = unknown.error.expect("unknown provider");
  assert_eq!(ErrorKind::from_code(err.code), ErrorKind::UnknownProvider);
  assert!(err.message.contains("nope"));

  env
    .mock
    .fail_next_create(orchestra_core::providers::ProviderError::Auth("bad key".into()));
  let auth: RpcResp<Value> = unix
    .call("agent.spawn", Some(json!({ "name": "c", "provider": "mock" })))
    .await;
  let err = auth.error.expect("auth");
  assert_eq!(ErrorKind::from_code(err.code), ErrorKind::ProviderAuth);
  assert_eq!(err.message, "bad key");

  let bad_params: RpcResp<Value> = unix.call("agent.get", Some(json!({ "nom": "x" }))).await;
  assert_eq!(
    ErrorKind::from_code(bad_params.error.expect("invalid").code),
    ErrorKind::InvalidParams
  );
  env.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_all_and_task_over_rpc() {
  let env = TestEnv::start().await;
  env.mock.fail_shutdown("b", "timeout");
  let http = env.http();
  for name in ["a", "b"] {
    let r: RpcResp<AgentInfo> = http
      .call("agent.spawn", Some(json!({ "name": name, "provider": "mock" })))
      .await;
    assert!(r.error.is_none());
  }

  let report: RpcResp<ShutdownReport> = http.call("agent.shutdown_all", None).await;
  let report = report.result.expect("report");
  assert_eq!(report.succeeded, vec!["a".to_string()]);
  assert_eq!(report.failed["b"], "timeout");

  let task: RpcResp<MessagesResponse> = http
    .call(
      "agent.task",
      Some(json!({ "name": "once", "provider": "mock", "prompt": "go" })),
    )
    .await;
  assert_eq!(task.result.expect("task").messages[0].content, "echo: go");

  let listed: RpcResp<AgentListResponse> = http.call("agent.list", Some(json!({}))).await;
  assert!(listed.result.expect("list").agents.is_empty());

  let providers: RpcResp<ProviderListResponse> = http.call("provider.list", None).await;
  let providers = providers.result.expect("providers").providers;
  assert_eq!(providers.len(), 1);
  assert_eq!(providers[0].name, "mock");
  assert!(providers[0].loaded && providers[0].credentials_valid);
  env.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_daemon_refuses_live_pid_file() {
  let env = TestEnv::start().await;
  let res = orchestra_core::daemon::start(
    env.home.daemon_config(),
    mock_engine(MockProvider::new()),
  )
  .await;
  match res {
    Err(DaemonError::AlreadyRunning { pid }) => assert_eq!(pid as u32, std::process::id()),
    Err(other) => panic!("unexpected error: {other}"),
    Ok(_) => panic!("second daemon started"),
  }
  // The first daemon is untouched.
  let v: RpcResp<Health> = env.unix().call("daemon.health", None).await;
  assert!(v.error.is_none());
  env.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_pid_file_is_cleared_at_startup() {
  ensure_logging_once();
  let home = TempHome::new();
  std::fs::write(home.pid_path(), "999999999\n").unwrap();
  std::fs::write(home.socket_path(), "").unwrap();

  let handle = start_daemon(&home, mock_engine(MockProvider::new())).await;
  let pid = std::fs::read_to_string(home.pid_path()).unwrap();
  assert_eq!(pid.trim(), std::process::id().to_string());
  handle.request_shutdown();
  handle.wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_shutdown_stops_agents_and_cleans_up() {
  let env = TestEnv::start().await;
  let unix = env.unix();
  let _: RpcResp<AgentInfo> = unix
    .call("agent.spawn", Some(json!({ "name": "a", "provider": "mock" })))
    .await;

  let ack: RpcResp<bool> = unix.call("daemon.shutdown", None).await;
  assert_eq!(ack.result, Some(true));

  let sock = env.home.socket_path();
  let pid_path = env.home.pid_path();
  let handle = &env.handle;
  let gone = poll_until(Duration::from_secs(3), Duration::from_millis(50), || {
    let done = handle.phase() == DaemonPhase::Stopped && !sock.exists() && !pid_path.exists();
    async move { done }
  })
  .await;
  assert!(gone, "daemon did not clean up after shutdown");
  env.handle.wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn busy_http_port_fails_start_and_leaves_nothing_behind() {
  ensure_logging_once();
  let home = TempHome::new();
  let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let mut config = home.daemon_config();
  config.http_port = taken.local_addr().unwrap().port();

  let res = orchestra_core::daemon::start(config, mock_engine(MockProvider::new())).await;
  match res {
    Err(DaemonError::Bind { transport, .. }) => assert_eq!(transport, "http"),
    Err(other) => panic!("unexpected error: {other}"),
    Ok(_) => panic!("daemon started on a busy port"),
  }
  assert!(!home.socket_path().exists(), "socket file left behind");
  assert!(!home.pid_path().exists(), "pid file left behind");
}
