use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, body::Bytes};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::{Client, Error as LegacyClientError};
use hyper_util::rt::TokioExecutor;
use hyperlocal::{UnixClientExt, UnixConnector};
use orchestra_core::config::RuntimePaths;
use orchestra_core::domain::{AgentInfo, Message, ShutdownReport};
use orchestra_core::rpc::{
  AgentListResponse, DaemonStatus, ErrorKind, Health, HistoryParams, ListParams, MessageParams,
  MessagesResponse, NameParams, ProviderListResponse, ProviderStatus, SpawnParams, TaskParams,
  methods,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Neither transport accepted a connection.
  #[error("daemon is not running; start it with `orchestra daemon start`")]
  DaemonNotRunning,
  #[error("{message}")]
  Remote {
    kind: ErrorKind,
    code: i32,
    message: String,
  },
  #[error("http: {0}")]
  Http(#[from] hyper::Error),
  #[error("request: {0}")]
  Request(#[from] hyper::http::Error),
  #[error("client: {0}")]
  Client(#[from] LegacyClientError),
  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("http status {0}: {1}")]
  HttpStatus(u16, String),
}

impl Error {
  /// Remote error kind, if the daemon answered with one.
  pub fn kind(&self) -> Option<ErrorKind> {
    match self {
      Error::Remote { kind, .. } => Some(*kind),
      _ => None,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stand-in for the daemon's engine. Each method is one round trip; the
/// Unix socket is preferred and loopback HTTP is the fallback.
pub struct DaemonClient {
  socket_path: PathBuf,
  http_addr: SocketAddr,
  unix: Client<UnixConnector, Full<Bytes>>,
  http: Client<HttpConnector, Full<Bytes>>,
}

impl DaemonClient {
  pub fn new(socket_path: &Path, http_port: u16) -> Self {
    Self {
      socket_path: socket_path.to_path_buf(),
      http_addr: SocketAddr::from(([127, 0, 0, 1], http_port)),
      unix: Client::unix(),
      http: Client::builder(TokioExecutor::new()).build_http(),
    }
  }

  pub fn from_paths(paths: &RuntimePaths) -> Self {
    Self::new(&paths.socket_path, paths.http_port)
  }

  pub fn socket_path(&self) -> &Path {
    &self.socket_path
  }

  pub async fn rpc_call(&self, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
    let body = serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }))?;

    if self.socket_path.exists() {
      let req = Request::builder()
        .method(Method::POST)
        .uri(hyperlocal::Uri::new(&self.socket_path, "/"))
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::<Bytes>::from(body.clone()))?;
      match self.unix.request(req).await {
        Ok(resp) => return decode(resp).await,
        Err(e) if e.is_connect() => {
          debug!(event = "rpc_unix_unreachable", socket = %self.socket_path.display(), error = %e, "falling back to http");
        }
        Err(e) => return Err(e.into()),
      }
    }

    let req = Request::builder()
      .method(Method::POST)
      .uri(format!("http://{}/", self.http_addr))
      .header(hyper::header::CONTENT_TYPE, "application/json")
      .body(Full::<Bytes>::from(body))?;
    match self.http.request(req).await {
      Ok(resp) => decode(resp).await,
      Err(e) if e.is_connect() => Err(Error::DaemonNotRunning),
      Err(e) => Err(e.into()),
    }
  }

  async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<serde_json::Value>) -> Result<T> {
    let v = self.rpc_call(method, params).await?;
    Ok(serde_json::from_value(v)?)
  }

  pub async fn status(&self) -> Result<DaemonStatus> {
    self.call(methods::DAEMON_STATUS, None).await
  }

  pub async fn health(&self) -> Result<Health> {
    self.call(methods::DAEMON_HEALTH, None).await
  }

  pub async fn shutdown_daemon(&self) -> Result<()> {
    let _: bool = self.call(methods::DAEMON_SHUTDOWN, None).await?;
    Ok(())
  }

  pub async fn spawn(&self, params: SpawnParams) -> Result<AgentInfo> {
    self
      .call(methods::AGENT_SPAWN, Some(serde_json::to_value(params)?))
      .await
  }

  pub async fn list(&self, params: ListParams) -> Result<Vec<AgentInfo>> {
    let resp: AgentListResponse = self
      .call(methods::AGENT_LIST, Some(serde_json::to_value(params)?))
      .await?;
    Ok(resp.agents)
  }

  pub async fn get(&self, name: &str) -> Result<AgentInfo> {
    let params = NameParams {
      name: name.to_string(),
    };
    self
      .call(methods::AGENT_GET, Some(serde_json::to_value(params)?))
      .await
  }

  pub async fn message(&self, name: &str, content: &str) -> Result<Vec<Message>> {
    let params = MessageParams {
      name: name.to_string(),
      content: content.to_string(),
    };
    let resp: MessagesResponse = self
      .call(methods::AGENT_MESSAGE, Some(serde_json::to_value(params)?))
      .await?;
    Ok(resp.messages)
  }

  pub async fn history(&self, name: &str, limit: Option<usize>) -> Result<Vec<Message>> {
    let params = HistoryParams {
      name: name.to_string(),
      limit,
    };
    let resp: MessagesResponse = self
      .call(methods::AGENT_HISTORY, Some(serde_json::to_value(params)?))
      .await?;
    Ok(resp.messages)
  }

  pub async fn shutdown(&self, name: &str) -> Result<()> {
    let params = NameParams {
      name: name.to_string(),
    };
    let _: bool = self
      .call(methods::AGENT_SHUTDOWN, Some(serde_json::to_value(params)?))
      .await?;
    Ok(())
  }

  pub async fn shutdown_all(&self) -> Result<ShutdownReport> {
    self.call(methods::AGENT_SHUTDOWN_ALL, None).await
  }

  pub async fn task(&self, params: TaskParams) -> Result<Vec<Message>> {
    let resp: MessagesResponse = self
      .call(methods::AGENT_TASK, Some(serde_json::to_value(params)?))
      .await?;
    Ok(resp.messages)
  }

  pub async fn providers(&self) -> Result<Vec<ProviderStatus>> {
    let resp: ProviderListResponse = self.call(methods::PROVIDER_LIST, None).await?;
    Ok(resp.providers)
  }
}

async fn decode(resp: hyper::Response<hyper::body::Incoming>) -> Result<serde_json::Value> {
  let status_code = resp.status();
  let bytes = resp.into_body().collect().await?.to_bytes();
  if !status_code.is_success() {
    return Err(Error::HttpStatus(
      status_code.as_u16(),
      String::from_utf8_lossy(&bytes).into(),
    ));
  }
  let v: serde_json::Value = serde_json::from_slice(&bytes)?;
  if let Some(err) = v.get("error") {
    let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(-32000) as i32;
    let message = match err.get("message").and_then(|m| m.as_str()) {
      Some(m) => m.to_string(),
      None => err.to_string(),
    };
    return Err(Error::Remote {
      kind: ErrorKind::from_code(code),
      code,
      message,
    });
  }
  v.get("result").cloned().ok_or_else(|| Error::Remote {
    kind: ErrorKind::Internal,
    code: ErrorKind::Internal.code(),
    message: "missing result".to_string(),
  })
}
