use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a live agent. Only the agent implementation writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
  Idle,
  Processing,
  Restarting,
  Failed,
  Terminated,
}

impl AgentState {
  pub fn as_str(&self) -> &'static str {
    match self {
      AgentState::Idle => "idle",
      AgentState::Processing => "processing",
      AgentState::Restarting => "restarting",
      AgentState::Failed => "failed",
      AgentState::Terminated => "terminated",
    }
  }
}

impl fmt::Display for AgentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AgentState {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "idle" => Ok(AgentState::Idle),
      "processing" => Ok(AgentState::Processing),
      "restarting" => Ok(AgentState::Restarting),
      "failed" => Ok(AgentState::Failed),
      "terminated" => Ok(AgentState::Terminated),
      other => Err(format!("unknown agent state `{other}`")),
    }
  }
}

/// Immutable description of an agent to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
  pub name: String,
  /// Backend execution model, e.g. `local` or `subprocess`.
  pub agent_type: String,
  /// Provider registry key.
  pub provider: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub instructions: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub base_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub credentials: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, serde_json::Value>,
}

impl AgentConfig {
  /// Config with the given name and provider; `agent_type` mirrors the provider.
  pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
    let provider = provider.into();
    Self {
      name: name.into(),
      agent_type: provider.clone(),
      provider,
      model: None,
      instructions: None,
      base_url: None,
      cwd: None,
      credentials: BTreeMap::new(),
      extra: BTreeMap::new(),
    }
  }

  pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
    self.agent_type = agent_type.into();
    self
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = Some(model.into());
    self
  }

  pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
    self.instructions = Some(instructions.into());
    self
  }

  pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.extra.insert(key.into(), value);
    self
  }
}

/// Read-only snapshot of a live agent, rebuilt on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
  pub name: String,
  pub agent_type: String,
  pub provider: String,
  pub state: AgentState,
}

/// Result of a bulk shutdown: who stopped cleanly and why the rest did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
  pub succeeded: Vec<String>,
  pub failed: BTreeMap<String, String>,
}

impl ShutdownReport {
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
  }

  /// Record the outcome for `name`. A later outcome for the same name
  /// replaces the earlier one, so each name is listed exactly once.
  pub fn record(&mut self, name: String, outcome: Result<(), String>) {
    match outcome {
      Ok(()) => {
        self.failed.remove(&name);
        if !self.succeeded.contains(&name) {
          self.succeeded.push(name);
        }
      }
      Err(message) => {
        self.succeeded.retain(|n| n != &name);
        self.failed.insert(name, message);
      }
    }
  }
}
