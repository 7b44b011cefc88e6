//! Capability contracts for agent backends and the registry that resolves
//! provider names to constructed providers.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::{AgentConfig, AgentState, Message};

pub mod command;
pub mod echo;
pub mod registry;

pub use registry::{ProviderRegistry, UnknownProvider};

/// Failure raised by a provider or one of its agents.
///
/// Every variant displays as the bare backend message so callers see the
/// cause verbatim; the variant itself carries the kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
  #[error("{0}")]
  Auth(String),
  #[error("{message}")]
  Api {
    message: String,
    status_code: Option<u16>,
  },
  #[error("{0}")]
  Timeout(String),
  #[error("{0}")]
  Config(String),
  #[error("{0}")]
  Other(String),
}

impl ProviderError {
  pub fn other(message: impl Into<String>) -> Self {
    ProviderError::Other(message.into())
  }

  pub fn api(message: impl Into<String>, status_code: Option<u16>) -> Self {
    ProviderError::Api {
      message: message.into(),
      status_code,
    }
  }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Lazy, finite sequence of replies produced by one `handle_message` call.
pub type ReplyStream<'a> = BoxStream<'a, ProviderResult<Message>>;

/// A live conversational participant.
///
/// The agent owns its `state`; callers only read it.
#[async_trait]
pub trait Agent: Send + Sync {
  fn name(&self) -> &str;
  fn agent_type(&self) -> &str;
  fn state(&self) -> AgentState;

  /// Start a fresh exchange. Each call yields zero or more replies.
  fn handle_message(&self, message: Message) -> ReplyStream<'_>;

  async fn shutdown(&self) -> ProviderResult<()>;
}

/// Factory for one backend family of agents.
#[async_trait]
pub trait AgentProvider: Send + Sync {
  fn provider_type(&self) -> &str;

  async fn create_agent(&self, config: &AgentConfig) -> ProviderResult<Arc<dyn Agent>>;

  /// Must never fail; report unusable credentials as `false`.
  async fn validate_credentials(&self) -> bool;
}
