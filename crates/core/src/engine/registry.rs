use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::error::{EngineError, EngineResult};
use crate::domain::{AgentConfig, AgentInfo, AgentState, ShutdownReport};
use crate::providers::{Agent, ProviderRegistry};

struct Entry {
  agent: Arc<dyn Agent>,
  config: AgentConfig,
}

impl Entry {
  fn info(&self) -> AgentInfo {
    AgentInfo {
      name: self.config.name.clone(),
      agent_type: self.config.agent_type.clone(),
      provider: self.config.provider.clone(),
      state: self.agent.state(),
    }
  }
}

/// Owner of the live agent set, keyed by unique name.
///
/// The map lock is never held across an await; provider calls run outside it.
pub struct AgentRegistry {
  providers: Arc<ProviderRegistry>,
  agents: Mutex<BTreeMap<String, Entry>>,
}

impl AgentRegistry {
  pub fn new(providers: Arc<ProviderRegistry>) -> Self {
    Self {
      providers,
      agents: Mutex::new(BTreeMap::new()),
    }
  }

  pub async fn spawn(&self, config: AgentConfig) -> EngineResult<Arc<dyn Agent>> {
    if self.has(&config.name) {
      return Err(EngineError::AlreadyExists(config.name));
    }
    let provider = self.providers.resolve(&config.provider)?;
    let agent = provider.create_agent(&config).await?;

    let name = config.name.clone();
    let lost_race = {
      let mut agents = self.agents.lock();
      if agents.contains_key(&name) {
        true
      } else {
        agents.insert(
          name.clone(),
          Entry {
            agent: agent.clone(),
            config,
          },
        );
        false
      }
    };
    if lost_race {
      // A concurrent spawn stored this name while the provider was building.
      if let Err(e) = agent.shutdown().await {
        warn!(event = "agent_discard_failed", agent = %name, error = %e, "discarded duplicate agent failed to shut down");
      }
      return Err(EngineError::AlreadyExists(name));
    }

    info!(event = "agent_spawned", agent = %name, agent_type = %agent.agent_type(), "agent spawned");
    Ok(agent)
  }

  pub fn get(&self, name: &str) -> EngineResult<Arc<dyn Agent>> {
    self
      .agents
      .lock()
      .get(name)
      .map(|e| e.agent.clone())
      .ok_or_else(|| EngineError::NotFound(name.to_string()))
  }

  pub fn info(&self, name: &str) -> EngineResult<AgentInfo> {
    self
      .agents
      .lock()
      .get(name)
      .map(Entry::info)
      .ok_or_else(|| EngineError::NotFound(name.to_string()))
  }

  pub fn has(&self, name: &str) -> bool {
    self.agents.lock().contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.agents.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Snapshots of live agents in name order; both filters must match.
  pub fn list(&self, state: Option<AgentState>, provider: Option<&str>) -> Vec<AgentInfo> {
    self
      .agents
      .lock()
      .values()
      .map(Entry::info)
      .filter(|info| state.is_none_or(|s| info.state == s))
      .filter(|info| provider.is_none_or(|p| info.provider == p))
      .collect()
  }

  /// Shut one agent down and forget it, even when its shutdown fails.
  pub async fn shutdown_one(&self, name: &str) -> EngineResult<()> {
    let agent = self.get(name)?;
    let result = agent.shutdown().await;
    self.forget(name, &agent);
    match result {
      Ok(()) => {
        info!(event = "agent_shutdown", agent = %name, "agent shut down");
        Ok(())
      }
      Err(e) => {
        warn!(event = "agent_shutdown_failed", agent = %name, error = %e, "agent shut down with error");
        Err(e.into())
      }
    }
  }

  /// Shut every agent down, collecting failures instead of stopping at one.
  /// The registry is empty when this returns.
  pub async fn shutdown_all(&self) -> ShutdownReport {
    let mut report = ShutdownReport::default();
    loop {
      let snapshot: Vec<(String, Arc<dyn Agent>)> = self
        .agents
        .lock()
        .iter()
        .map(|(name, e)| (name.clone(), e.agent.clone()))
        .collect();
      if snapshot.is_empty() {
        break;
      }
      for (name, agent) in snapshot {
        let result = agent.shutdown().await;
        self.forget(&name, &agent);
        // A name respawned mid-pass is reported once, with its last outcome.
        report.record(name, result.map_err(|e| e.to_string()));
      }
    }
    info!(
      event = "agents_shutdown_all",
      succeeded = report.succeeded.len(),
      failed = report.failed.len(),
      "bulk shutdown finished"
    );
    report
  }

  /// Remove `name` only if it still maps to `agent`.
  fn forget(&self, name: &str, agent: &Arc<dyn Agent>) {
    let mut agents = self.agents.lock();
    if agents
      .get(name)
      .is_some_and(|e| Arc::ptr_eq(&e.agent, agent))
    {
      agents.remove(name);
    }
  }
}
