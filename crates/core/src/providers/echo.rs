use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;

use super::{Agent, AgentProvider, ProviderError, ProviderResult, ReplyStream};
use crate::domain::{AgentConfig, AgentState, Message};

/// In-process provider whose agents repeat what they receive.
pub struct EchoProvider;

impl EchoProvider {
  pub const TYPE: &'static str = "echo";
}

#[async_trait]
impl AgentProvider for EchoProvider {
  fn provider_type(&self) -> &str {
    Self::TYPE
  }

  async fn create_agent(&self, config: &AgentConfig) -> ProviderResult<Arc<dyn Agent>> {
    Ok(Arc::new(EchoAgent {
      name: config.name.clone(),
      agent_type: config.agent_type.clone(),
      prefix: config.instructions.clone(),
      state: Mutex::new(AgentState::Idle),
    }))
  }

  async fn validate_credentials(&self) -> bool {
    true
  }
}

pub struct EchoAgent {
  name: String,
  agent_type: String,
  prefix: Option<String>,
  state: Mutex<AgentState>,
}

#[async_trait]
impl Agent for EchoAgent {
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
    if self.state() == AgentState::Terminated {
      let err = ProviderError::other(format!("agent `{}` has been shut down", self.name));
      return stream::once(async move { Err::<Message, _>(err) }).boxed();
    }
    let content = match &self.prefix {
      Some(prefix) => format!("{prefix} {}", message.content),
      None => message.content,
    };
    stream::once(async move { Ok(Message::reply(&self.name, content)) }).boxed()
  }

  async fn shutdown(&self) -> ProviderResult<()> {
    *self.state.lock() = AgentState::Terminated;
    Ok(())
  }
}
