use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use super::AgentProvider;
use super::command::CommandProvider;
use super::echo::EchoProvider;
use crate::config::Config;

type Loader = Box<dyn Fn() -> Arc<dyn AgentProvider> + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown provider `{provider}` (available: {})", .available.join(", "))]
pub struct UnknownProvider {
  pub provider: String,
  pub available: Vec<String>,
}

/// Maps provider names to provider instances, constructing built-ins on
/// first reference.
#[derive(Default)]
pub struct ProviderRegistry {
  providers: RwLock<BTreeMap<String, Arc<dyn AgentProvider>>>,
  loaders: RwLock<BTreeMap<String, Loader>>,
}

impl ProviderRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry that knows how to build the `echo` and `command` providers.
  pub fn with_builtins(config: &Config) -> Self {
    let registry = Self::new();
    registry.add_loader(EchoProvider::TYPE, || Arc::new(EchoProvider));
    let presets = config
      .commands
      .iter()
      .map(|(name, preset)| (name.clone(), preset.argv.clone()))
      .collect::<BTreeMap<_, _>>();
    let timeout = config.command_timeout_secs.map(Duration::from_secs);
    registry.add_loader(CommandProvider::TYPE, move || {
      Arc::new(CommandProvider::new(presets.clone(), timeout))
    });
    registry
  }

  /// Make `type_name` loadable without constructing it yet.
  pub fn add_loader<F>(&self, type_name: &str, loader: F)
  where
    F: Fn() -> Arc<dyn AgentProvider> + Send + Sync + 'static,
  {
    self
      .loaders
      .write()
      .insert(type_name.to_string(), Box::new(loader));
  }

  /// Store a provider instance. A second registration under the same name
  /// replaces the first.
  pub fn register(&self, type_name: &str, provider: Arc<dyn AgentProvider>) {
    let replaced = self
      .providers
      .write()
      .insert(type_name.to_string(), provider)
      .is_some();
    debug!(event = "provider_registered", provider = %type_name, replaced, "provider registered");
  }

  /// Run the loader for `type_name` unless it is already registered.
  /// Returns whether the provider is available afterwards.
  pub fn ensure_loaded(&self, type_name: &str) -> bool {
    if self.providers.read().contains_key(type_name) {
      return true;
    }
    let provider = {
      let loaders = self.loaders.read();
      match loaders.get(type_name) {
        Some(load) => load(),
        None => return false,
      }
    };
    let mut providers = self.providers.write();
    // Another caller may have won the race; keep its instance.
    providers.entry(type_name.to_string()).or_insert(provider);
    info!(event = "provider_loaded", provider = %type_name, "provider loaded");
    true
  }

  pub fn resolve(&self, type_name: &str) -> Result<Arc<dyn AgentProvider>, UnknownProvider> {
    self.ensure_loaded(type_name);
    self
      .providers
      .read()
      .get(type_name)
      .cloned()
      .ok_or_else(|| UnknownProvider {
        provider: type_name.to_string(),
        available: self.known().into_iter().collect(),
      })
  }

  pub fn list_registered(&self) -> BTreeSet<String> {
    self.providers.read().keys().cloned().collect()
  }

  /// Registered names plus names that can still be loaded.
  pub fn known(&self) -> BTreeSet<String> {
    let mut names = self.list_registered();
    names.extend(self.loaders.read().keys().cloned());
    names
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::AgentConfig;
  use crate::providers::{Agent, ProviderResult};
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct Named(&'static str);

  #[async_trait]
  impl AgentProvider for Named {
    fn provider_type(&self) -> &str {
      self.0
    }
    async fn create_agent(&self, _config: &AgentConfig) -> ProviderResult<Arc<dyn Agent>> {
      Err(crate::providers::ProviderError::other("not used"))
    }
    async fn validate_credentials(&self) -> bool {
      true
    }
  }

  #[test]
  fn resolve_unknown_names_requested_type() {
    let reg = ProviderRegistry::new();
    reg.register("a", Arc::new(Named("a")));
    let err = reg.resolve("zzz").err().expect("unknown");
    assert_eq!(err.provider, "zzz");
    assert_eq!(err.available, vec!["a".to_string()]);
    assert!(err.to_string().contains("`zzz`"));
  }

  #[test]
  fn register_overwrites_silently() {
    let reg = ProviderRegistry::new();
    reg.register("x", Arc::new(Named("first")));
    reg.register("x", Arc::new(Named("second")));
    let p = reg.resolve("x").unwrap();
    assert_eq!(p.provider_type(), "second");
    assert_eq!(reg.list_registered().len(), 1);
  }

  #[test]
  fn loader_runs_once_on_first_reference() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    let reg = ProviderRegistry::new();
    reg.add_loader("lazy", || {
      CALLS.fetch_add(1, Ordering::SeqCst);
      Arc::new(Named("lazy"))
    });
    assert!(reg.list_registered().is_empty());
    assert!(reg.known().contains("lazy"));

    reg.resolve("lazy").unwrap();
    reg.resolve("lazy").unwrap();
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert!(reg.list_registered().contains("lazy"));
  }

  #[test]
  fn builtins_are_lazy() {
    let reg = ProviderRegistry::with_builtins(&Config::default());
    assert!(reg.list_registered().is_empty());
    assert!(reg.ensure_loaded("echo"));
    assert!(!reg.ensure_loaded("nope"));
    assert_eq!(
      reg.list_registered().into_iter().collect::<Vec<_>>(),
      vec!["echo".to_string()]
    );
  }
}
