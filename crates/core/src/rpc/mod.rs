//! JSON-RPC method names, parameter and result types, and error codes shared
//! by the daemon and its clients.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{AgentConfig, AgentInfo, AgentState, Message};
use crate::engine::EngineError;
use crate::providers::ProviderError;

pub mod methods {
  pub const DAEMON_STATUS: &str = "daemon.status";
  pub const DAEMON_HEALTH: &str = "daemon.health";
  pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";
  pub const AGENT_SPAWN: &str = "agent.spawn";
  pub const AGENT_LIST: &str = "agent.list";
  pub const AGENT_GET: &str = "agent.get";
  pub const AGENT_MESSAGE: &str = "agent.message";
  pub const AGENT_HISTORY: &str = "agent.history";
  pub const AGENT_SHUTDOWN: &str = "agent.shutdown";
  pub const AGENT_SHUTDOWN_ALL: &str = "agent.shutdown_all";
  pub const AGENT_TASK: &str = "agent.task";
  pub const PROVIDER_LIST: &str = "provider.list";
}

/// Failure kinds distinguishable across the wire, one JSON-RPC code each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  AlreadyExists,
  UnknownProvider,
  ProviderAuth,
  ProviderApi,
  ProviderTimeout,
  ProviderConfig,
  Provider,
  InvalidParams,
  Internal,
}

impl ErrorKind {
  pub fn code(self) -> i32 {
    match self {
      ErrorKind::NotFound => -32001,
      ErrorKind::AlreadyExists => -32002,
      ErrorKind::UnknownProvider => -32003,
      ErrorKind::ProviderAuth => -32010,
      ErrorKind::ProviderApi => -32011,
      ErrorKind::ProviderTimeout => -32012,
      ErrorKind::ProviderConfig => -32013,
      ErrorKind::Provider => -32014,
      ErrorKind::InvalidParams => -32602,
      ErrorKind::Internal => -32000,
    }
  }

  /// Unknown codes map to `Internal`.
  pub fn from_code(code: i32) -> Self {
    match code {
      -32001 => ErrorKind::NotFound,
      -32002 => ErrorKind::AlreadyExists,
      -32003 => ErrorKind::UnknownProvider,
      -32010 => ErrorKind::ProviderAuth,
      -32011 => ErrorKind::ProviderApi,
      -32012 => ErrorKind::ProviderTimeout,
      -32013 => ErrorKind::ProviderConfig,
      -32014 => ErrorKind::Provider,
      -32602 => ErrorKind::InvalidParams,
      _ => ErrorKind::Internal,
    }
  }

  pub fn is_provider(self) -> bool {
    matches!(
      self,
      ErrorKind::ProviderAuth
        | ErrorKind::ProviderApi
        | ErrorKind::ProviderTimeout
        | ErrorKind::ProviderConfig
        | ErrorKind::Provider
    )
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ErrorKind::NotFound => "not found",
      ErrorKind::AlreadyExists => "already exists",
      ErrorKind::UnknownProvider => "unknown provider",
      ErrorKind::ProviderAuth => "provider authentication failed",
      ErrorKind::ProviderApi => "provider API error",
      ErrorKind::ProviderTimeout => "provider timed out",
      ErrorKind::ProviderConfig => "provider misconfigured",
      ErrorKind::Provider => "provider error",
      ErrorKind::InvalidParams => "invalid params",
      ErrorKind::Internal => "internal error",
    };
    f.write_str(s)
  }
}

impl From<&ProviderError> for ErrorKind {
  fn from(err: &ProviderError) -> Self {
    match err {
      ProviderError::Auth(_) => ErrorKind::ProviderAuth,
      ProviderError::Api { .. } => ErrorKind::ProviderApi,
      ProviderError::Timeout(_) => ErrorKind::ProviderTimeout,
      ProviderError::Config(_) => ErrorKind::ProviderConfig,
      ProviderError::Other(_) => ErrorKind::Provider,
    }
  }
}

impl From<&EngineError> for ErrorKind {
  fn from(err: &EngineError) -> Self {
    match err {
      EngineError::AlreadyExists(_) => ErrorKind::AlreadyExists,
      EngineError::NotFound(_) => ErrorKind::NotFound,
      EngineError::UnknownProvider(_) => ErrorKind::UnknownProvider,
      EngineError::Provider(p) => p.into(),
    }
  }
}

/// Response type for daemon.status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DaemonStatus {
  pub version: String,
  pub pid: u32,
  pub socket_path: String,
  pub http_addr: String,
}

/// Response type for daemon.health
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
  pub status: String,
  pub agents: usize,
}

fn default_agent_type() -> String {
  "echo".to_string()
}

/// Params for agent.spawn; `provider` falls back to `agent_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpawnParams {
  pub name: String,
  #[serde(default = "default_agent_type")]
  pub agent_type: String,
  #[serde(default)]
  pub provider: Option<String>,
  #[serde(default)]
  pub model: Option<String>,
  #[serde(default)]
  pub instructions: Option<String>,
  #[serde(default)]
  pub base_url: Option<String>,
  #[serde(default)]
  pub cwd: Option<PathBuf>,
  #[serde(default)]
  pub credentials: BTreeMap<String, String>,
  #[serde(default)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

impl SpawnParams {
  pub fn into_config(self) -> AgentConfig {
    let provider = self.provider.unwrap_or_else(|| self.agent_type.clone());
    AgentConfig {
      name: self.name,
      agent_type: self.agent_type,
      provider,
      model: self.model,
      instructions: self.instructions,
      base_url: self.base_url,
      cwd: self.cwd,
      credentials: self.credentials,
      extra: self.extra,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListParams {
  #[serde(default)]
  pub state: Option<AgentState>,
  #[serde(default)]
  pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameParams {
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageParams {
  pub name: String,
  pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryParams {
  pub name: String,
  #[serde(default)]
  pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskParams {
  #[serde(flatten)]
  pub agent: SpawnParams,
  pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentListResponse {
  pub agents: Vec<AgentInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagesResponse {
  pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderStatus {
  pub name: String,
  pub loaded: bool,
  pub credentials_valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderListResponse {
  pub providers: Vec<ProviderStatus>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_round_trip_for_every_kind() {
    let kinds = [
      ErrorKind::NotFound,
      ErrorKind::AlreadyExists,
      ErrorKind::UnknownProvider,
      ErrorKind::ProviderAuth,
      ErrorKind::ProviderApi,
      ErrorKind::ProviderTimeout,
      ErrorKind::ProviderConfig,
      ErrorKind::Provider,
      ErrorKind::InvalidParams,
      ErrorKind::Internal,
    ];
    for kind in kinds {
      assert_eq!(ErrorKind::from_code(kind.code()), kind);
    }
    assert_eq!(ErrorKind::from_code(-1), ErrorKind::Internal);
  }

  #[test]
  fn provider_errors_keep_their_kind() {
    let err = EngineError::Provider(ProviderError::Auth("bad key".into()));
    assert_eq!(ErrorKind::from(&err), ErrorKind::ProviderAuth);
    assert_eq!(err.to_string(), "bad key");
  }

  #[test]
  fn spawn_params_default_provider_to_agent_type() {
    let p: SpawnParams = serde_json::from_value(serde_json::json!({ "name": "a" })).unwrap();
    let cfg = p.into_config();
    assert_eq!(cfg.agent_type, "echo");
    assert_eq!(cfg.provider, "echo");

    let p: SpawnParams = serde_json::from_value(serde_json::json!({
      "name": "b", "agent_type": "subprocess", "provider": "command",
      "extra": { "preset": "shell" }
    }))
    .unwrap();
    let cfg = p.into_config();
    assert_eq!(cfg.provider, "command");
    assert_eq!(cfg.extra["preset"], "shell");
  }

  #[test]
  fn task_params_flatten_agent_fields() {
    let p: TaskParams = serde_json::from_value(serde_json::json!({
      "name": "t", "provider": "echo", "prompt": "go"
    }))
    .unwrap();
    assert_eq!(p.agent.name, "t");
    assert_eq!(p.prompt, "go");
  }
}
