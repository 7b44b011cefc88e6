//! Orchestration engine: the agent registry plus per-agent conversation
//! history. Every transport talks to one engine instance.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{AgentConfig, AgentInfo, AgentState, Message, ShutdownReport};
use crate::providers::ProviderRegistry;

mod error;
mod registry;

pub use error::{EngineError, EngineResult};
pub use registry::AgentRegistry;

pub struct OrchestrationEngine {
  providers: Arc<ProviderRegistry>,
  registry: AgentRegistry,
  history: Mutex<HashMap<String, Vec<Message>>>,
}

impl OrchestrationEngine {
  pub fn new(providers: Arc<ProviderRegistry>) -> Self {
    Self {
      registry: AgentRegistry::new(providers.clone()),
      providers,
      history: Mutex::new(HashMap::new()),
    }
  }

  /// Engine backed by the built-in providers configured from `config`.
  pub fn with_builtins(config: &Config) -> Self {
    Self::new(Arc::new(ProviderRegistry::with_builtins(config)))
  }

  pub fn providers(&self) -> &Arc<ProviderRegistry> {
    &self.providers
  }

  pub fn registry(&self) -> &AgentRegistry {
    &self.registry
  }

  pub async fn spawn_agent(&self, config: AgentConfig) -> EngineResult<AgentInfo> {
    self.providers.ensure_loaded(&config.provider);
    let name = config.name.clone();
    let provider = config.provider.clone();
    let agent_type = config.agent_type.clone();
    let agent = self.registry.spawn(config).await?;
    // A respawned name keeps appending to its earlier record.
    self.history.lock().entry(name.clone()).or_default();
    Ok(AgentInfo {
      name,
      agent_type,
      provider,
      state: agent.state(),
    })
  }

  pub fn list_agents(&self, state: Option<AgentState>, provider: Option<&str>) -> Vec<AgentInfo> {
    self.registry.list(state, provider)
  }

  pub fn get_agent(&self, name: &str) -> EngineResult<AgentInfo> {
    self.registry.info(name)
  }

  pub fn agent_count(&self) -> usize {
    self.registry.len()
  }

  /// Deliver `content` to `name` and return its replies in arrival order.
  ///
  /// The human message and every reply received before a failure are kept
  /// in history.
  pub async fn send_message(&self, name: &str, content: &str) -> EngineResult<Vec<Message>> {
    let agent = self.registry.get(name)?;
    let outgoing = Message::human(name, content);
    self.record(name, outgoing.clone());

    let mut replies = Vec::new();
    let mut stream = agent.handle_message(outgoing);
    while let Some(item) = stream.next().await {
      let reply = item?;
      self.record(name, reply.clone());
      replies.push(reply);
    }
    debug!(event = "agent_message", agent = %name, replies = replies.len(), "message handled");
    Ok(replies)
  }

  /// Recorded history for `name`; empty for names never seen.
  pub fn get_history(&self, name: &str) -> Vec<Message> {
    self.history.lock().get(name).cloned().unwrap_or_default()
  }

  /// The last `limit` messages of `name`'s history.
  pub fn get_history_tail(&self, name: &str, limit: usize) -> Vec<Message> {
    let history = self.history.lock();
    match history.get(name) {
      Some(messages) => messages[messages.len().saturating_sub(limit)..].to_vec(),
      None => Vec::new(),
    }
  }

  pub async fn shutdown_agent(&self, name: &str) -> EngineResult<()> {
    self.registry.shutdown_one(name).await
  }

  pub async fn shutdown_all(&self) -> ShutdownReport {
    self.registry.shutdown_all().await
  }

  /// Spawn, send one prompt, then shut down. The agent is shut down even
  /// when the message fails; the message error wins over a shutdown error.
  pub async fn run_task(&self, config: AgentConfig, prompt: &str) -> EngineResult<Vec<Message>> {
    let name = config.name.clone();
    self.spawn_agent(config).await?;
    let replies = self.send_message(&name, prompt).await;
    let shutdown = self.shutdown_agent(&name).await;
    info!(event = "agent_task_finished", agent = %name, ok = replies.is_ok(), "one-shot task finished");
    let replies = replies?;
    shutdown?;
    Ok(replies)
  }

  fn record(&self, name: &str, message: Message) {
    self
      .history
      .lock()
      .entry(name.to_string())
      .or_default()
      .push(message);
  }
}

static SHARED: Lazy<Mutex<Option<Arc<OrchestrationEngine>>>> = Lazy::new(|| Mutex::new(None));

/// Process-wide engine, created on first use with `config`.
///
/// Meant for the outermost composition point only; everything else takes the
/// engine as an argument.
pub fn shared_engine(config: &Config) -> Arc<OrchestrationEngine> {
  SHARED
    .lock()
    .get_or_insert_with(|| Arc::new(OrchestrationEngine::with_builtins(config)))
    .clone()
}

/// Drop the process-wide engine so the next `shared_engine` builds a new one.
pub fn reset_shared_engine() {
  SHARED.lock().take();
}
