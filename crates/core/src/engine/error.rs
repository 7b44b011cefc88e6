use thiserror::Error;

use crate::providers::{ProviderError, UnknownProvider};

/// Lifecycle failures from the agent registry and the engine.
///
/// Provider failures pass through untouched so callers can tell a taken
/// name from a misconfigured or rejecting backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
  #[error("agent `{0}` already exists")]
  AlreadyExists(String),
  #[error("agent `{0}` not found")]
  NotFound(String),
  #[error(transparent)]
  UnknownProvider(#[from] UnknownProvider),
  #[error(transparent)]
  Provider(#[from] ProviderError),
}

pub type EngineResult<T> = Result<T, EngineError>;
