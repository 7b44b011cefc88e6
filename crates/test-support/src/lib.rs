use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use http_body_util::BodyExt;
use hyperlocal::UnixClientExt;
use orchestra_core::daemon::{DaemonConfig, DaemonHandle};
use orchestra_core::domain::{AgentConfig, AgentState, Message};
use orchestra_core::engine::OrchestrationEngine;
use orchestra_core::providers::{
  Agent, AgentProvider, ProviderError, ProviderRegistry, ProviderResult, ReplyStream,
};
use parking_lot::Mutex;

/// Temporary daemon home: socket, pid file and logs live under one tempdir.
pub struct TempHome {
  pub root: tempfile::TempDir,
}

impl Default for TempHome {
  fn default() -> Self {
    Self::new()
  }
}

impl TempHome {
  pub fn new() -> Self {
    let root = tempfile::tempdir().expect("tempdir");
    Self { root }
  }

  pub fn path(&self) -> PathBuf {
    self.root.path().to_path_buf()
  }

  pub fn socket_path(&self) -> PathBuf {
    self.path().join("daemon.sock")
  }

  pub fn pid_path(&self) -> PathBuf {
    self.path().join("daemon.pid")
  }

  /// Daemon config for this home with an ephemeral HTTP port.
  pub fn daemon_config(&self) -> DaemonConfig {
    DaemonConfig {
      socket_path: self.socket_path(),
      pid_path: self.pid_path(),
      http_port: 0,
    }
  }
}

/// Engine whose only provider is `mock`.
pub fn mock_engine(mock: Arc<MockProvider>) -> Arc<OrchestrationEngine> {
  let providers = ProviderRegistry::new();
  providers.register(MockProvider::TYPE, mock);
  Arc::new(OrchestrationEngine::new(Arc::new(providers)))
}

/// Start a daemon for `engine` in `home` and wait until it answers.
pub async fn start_daemon(home: &TempHome, engine: Arc<OrchestrationEngine>) -> DaemonHandle {
  let handle = orchestra_core::daemon::start(home.daemon_config(), engine)
    .await
    .expect("start daemon");
  let client = UnixRpcClient::new(handle.socket_path());
  let ok = poll_until(Duration::from_secs(2), Duration::from_millis(50), || {
    let c = &client;
    async move {
      let r: RpcResp<serde_json::Value> = c.call("daemon.health", None).await;
      r.error.is_none()
    }
  })
  .await;
  assert!(ok, "daemon did not become ready in time");
  handle
}

/// Poll a condition repeatedly until it returns true or times out.
/// Returns true if condition met, false on timeout.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> bool
where
  F: FnMut() -> Fut,
  Fut: std::future::Future<Output = bool>,
{
  use tokio::time::{Instant, sleep};
  let start = Instant::now();
  loop {
    if check().await {
      return true;
    }
    if start.elapsed() >= timeout {
      return false;
    }
    sleep(interval).await;
  }
}

/// Minimal JSON-RPC 2.0 response wrapper for tests.
#[derive(Debug, serde::Deserialize)]
pub struct RpcError {
  pub code: i32,
  pub message: String,
  pub data: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RpcResp<T> {
  pub jsonrpc: String,
  pub id: serde_json::Value,
  pub result: Option<T>,
  pub error: Option<RpcError>,
}

fn request_body(method: &str, params: Option<serde_json::Value>) -> http_body_util::Full<hyper::body::Bytes> {
  let body = serde_json::json!({
    "jsonrpc": "2.0",
    "id": 1,
    "method": method,
    "params": params
  });
  http_body_util::Full::<hyper::body::Bytes>::from(serde_json::to_vec(&body).unwrap())
}

async fn decode<T: serde::de::DeserializeOwned>(
  resp: hyper::Response<hyper::body::Incoming>,
) -> RpcResp<T> {
  assert!(resp.status().is_success(), "http status {}", resp.status());
  let bytes = resp.into_body().collect().await.unwrap().to_bytes();
  serde_json::from_slice(&bytes).expect("valid json")
}

/// A tiny Unix-domain JSON-RPC client used by tests.
pub struct UnixRpcClient {
  sock: PathBuf,
}

impl UnixRpcClient {
  pub fn new<P: AsRef<Path>>(sock: P) -> Self {
    Self {
      sock: sock.as_ref().to_path_buf(),
    }
  }

  pub async fn call<T: serde::de::DeserializeOwned>(
    &self,
    method: &str,
    params: Option<serde_json::Value>,
  ) -> RpcResp<T> {
    let req = hyper::Request::builder()
      .method(hyper::Method::POST)
      .uri(hyperlocal::Uri::new(&self.sock, "/"))
      .header(hyper::header::CONTENT_TYPE, "application/json")
      .body(request_body(method, params))
      .unwrap();
    let client = hyper_util::client::legacy::Client::unix();
    let resp = client.request(req).await.expect("request ok");
    decode(resp).await
  }
}

/// The same client over the loopback HTTP transport.
pub struct HttpRpcClient {
  addr: SocketAddr,
}

impl HttpRpcClient {
  pub fn new(addr: SocketAddr) -> Self {
    Self { addr }
  }

  pub async fn call<T: serde::de::DeserializeOwned>(
    &self,
    method: &str,
    params: Option<serde_json::Value>,
  ) -> RpcResp<T> {
    let req = hyper::Request::builder()
      .method(hyper::Method::POST)
      .uri(format!("http://{}/", self.addr))
      .header(hyper::header::CONTENT_TYPE, "application/json")
      .body(request_body(method, params))
      .unwrap();
    let client = hyper_util::client::legacy::Client::builder(
      hyper_util::rt::TokioExecutor::new(),
    )
    .build_http();
    let resp = client.request(req).await.expect("request ok");
    decode(resp).await
  }
}

#[derive(Debug, Clone, Default)]
struct Script {
  replies: Option<Vec<String>>,
  initial_state: Option<AgentState>,
  message_error: Option<ProviderError>,
  shutdown_error: Option<String>,
}

/// Scriptable provider registered as `mock`. Agents reply `echo: <content>`
/// unless told otherwise.
#[derive(Default)]
pub struct MockProvider {
  scripts: Mutex<HashMap<String, Script>>,
  create_error: Mutex<Option<ProviderError>>,
  created: AtomicUsize,
  credentials_valid: bool,
}

impl MockProvider {
  pub const TYPE: &'static str = "mock";

  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      credentials_valid: true,
      ..Self::default()
    })
  }

  /// Agent `name` answers each message with exactly `replies`.
  pub fn replies(&self, name: &str, replies: &[&str]) {
    self.scripts.lock().entry(name.to_string()).or_default().replies =
      Some(replies.iter().map(|r| r.to_string()).collect());
  }

  /// Agent `name` starts out in `state` instead of idle.
  pub fn start_in(&self, name: &str, state: AgentState) {
    self.scripts.lock().entry(name.to_string()).or_default().initial_state = Some(state);
  }

  /// Agent `name` fails every message with `err`.
  pub fn fail_messages(&self, name: &str, err: ProviderError) {
    self.scripts.lock().entry(name.to_string()).or_default().message_error = Some(err);
  }

  /// Agent `name` raises `message` from shutdown.
  pub fn fail_shutdown(&self, name: &str, message: &str) {
    self.scripts.lock().entry(name.to_string()).or_default().shutdown_error =
      Some(message.to_string());
  }

  /// The next `create_agent` call fails with `err`.
  pub fn fail_next_create(&self, err: ProviderError) {
    *self.create_error.lock() = Some(err);
  }

  pub fn created(&self) -> usize {
    self.created.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl AgentProvider for MockProvider {
  fn provider_type(&self) -> &str {
    Self::TYPE
  }

  async fn create_agent(&self, config: &AgentConfig) -> ProviderResult<Arc<dyn Agent>> {
    if let Some(err) = self.create_error.lock().take() {
      return Err(err);
    }
    self.created.fetch_add(1, Ordering::SeqCst);
    let script = self
      .scripts
      .lock()
      .get(&config.name)
      .cloned()
      .unwrap_or_default();
    Ok(Arc::new(MockAgent {
      name: config.name.clone(),
      agent_type: config.agent_type.clone(),
      state: Mutex::new(script.initial_state.unwrap_or(AgentState::Idle)),
      script,
      shutdowns: AtomicUsize::new(0),
    }))
  }

  async fn validate_credentials(&self) -> bool {
    self.credentials_valid
  }
}

pub struct MockAgent {
  name: String,
  agent_type: String,
  state: Mutex<AgentState>,
  script: Script,
  shutdowns: AtomicUsize,
}

impl MockAgent {
  pub fn shutdowns(&self) -> usize {
    self.shutdowns.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Agent for MockAgent {
  fn name(&self) -> &str {
    &self.name
  }

  fn agent_type(&self) -> &str {
    &self.agent_type
  }

  fn state(&self) -> AgentState {
    *self.state.lock()
  }

  fn handle_message(&self, message: Message) -> ReplyStream<'_> {
    if let Some(err) = self.script.message_error.clone() {
      return stream::once(async move { Err::<Message, _>(err) }).boxed();
    }
    let replies = match &self.script.replies {
      Some(replies) => replies.clone(),
      None => vec![format!("echo: {}", message.content)],
    };
    let name = self.name.clone();
    stream::iter(replies.into_iter().map(move |r| Ok(Message::reply(&name, r)))).boxed()
  }

  async fn shutdown(&self) -> ProviderResult<()> {
    self.shutdowns.fetch_add(1, Ordering::SeqCst);
    *self.state.lock() = AgentState::Terminated;
    match &self.script.shutdown_error {
      Some(msg) => Err(ProviderError::other(msg.clone())),
      None => Ok(()),
    }
  }
}
