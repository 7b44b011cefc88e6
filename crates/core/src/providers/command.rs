use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Agent, AgentProvider, ProviderError, ProviderResult, ReplyStream};
use crate::domain::{AgentConfig, AgentState, Message};

/// Provider whose agents answer each message by running a command line.
///
/// The argv comes from `extra.command` or from a named `extra.preset`
/// declared under `[commands.<name>]` in the config file. Credentials are
/// exported to the command's environment under their own names and never
/// substituted into arguments.
pub struct CommandProvider {
  presets: BTreeMap<String, Vec<String>>,
  default_timeout: Option<Duration>,
}

impl CommandProvider {
  pub const TYPE: &'static str = "command";

  pub fn new(presets: BTreeMap<String, Vec<String>>, default_timeout: Option<Duration>) -> Self {
    Self {
      presets,
      default_timeout,
    }
  }

  fn resolve_argv(&self, config: &AgentConfig) -> ProviderResult<Vec<String>> {
    let argv = if let Some(raw) = config.extra.get("command") {
      serde_json::from_value::<Vec<String>>(raw.clone()).map_err(|_| {
        ProviderError::Config("`command` must be an array of strings".to_string())
      })?
    } else if let Some(preset) = config.extra.get("preset").and_then(|v| v.as_str()) {
      self
        .presets
        .get(preset)
        .cloned()
        .ok_or_else(|| ProviderError::Config(format!("command preset `{preset}` is not configured")))?
    } else {
      return Err(ProviderError::Config(
        "command agents need `command` or `preset` in extra".to_string(),
      ));
    };
    if argv.is_empty() {
      return Err(ProviderError::Config("command must not be empty".to_string()));
    }
    Ok(argv)
  }

  /// Explicit credentials, plus every name listed in `extra.require_env`
  /// that is missing from them, looked up in the daemon's environment.
  fn resolve_credentials(&self, config: &AgentConfig) -> ProviderResult<BTreeMap<String, String>> {
    let mut credentials = config.credentials.clone();
    let Some(raw) = config.extra.get("require_env") else {
      return Ok(credentials);
    };
    let required = serde_json::from_value::<Vec<String>>(raw.clone()).map_err(|_| {
      ProviderError::Config("`require_env` must be an array of strings".to_string())
    })?;
    for name in required {
      if credentials.get(&name).is_some_and(|v| !v.is_empty()) {
        continue;
      }
      match std::env::var(&name) {
        Ok(value) if !value.is_empty() => {
          credentials.insert(name, value);
        }
        _ => {
          return Err(ProviderError::Auth(format!(
            "missing credential `{name}`: pass --credential {name}=... or set {name}"
          )));
        }
      }
    }
    Ok(credentials)
  }

  fn resolve_timeout(&self, config: &AgentConfig) -> ProviderResult<Option<Duration>> {
    match config.extra.get("timeout_secs") {
      Some(v) => v
        .as_u64()
        .map(|secs| Some(Duration::from_secs(secs)))
        .ok_or_else(|| ProviderError::Config("`timeout_secs` must be a positive integer".to_string())),
      None => Ok(self.default_timeout),
    }
  }
}

#[async_trait]
impl AgentProvider for CommandProvider {
  fn provider_type(&self) -> &str {
    Self::TYPE
  }

  async fn create_agent(&self, config: &AgentConfig) -> ProviderResult<Arc<dyn Agent>> {
    let argv = self.resolve_argv(config)?;
    let timeout = self.resolve_timeout(config)?;
    let credentials = self.resolve_credentials(config)?;
    if let Some(cwd) = &config.cwd
      && !cwd.is_dir()
    {
      return Err(ProviderError::Config(format!(
        "working directory {} does not exist",
        cwd.display()
      )));
    }
    Ok(Arc::new(CommandAgent {
      name: config.name.clone(),
      agent_type: config.agent_type.clone(),
      model: config.model.clone(),
      instructions: config.instructions.clone(),
      base_url: config.base_url.clone(),
      credentials,
      argv,
      cwd: config.cwd.clone(),
      timeout,
      state: Mutex::new(AgentState::Idle),
    }))
  }

  /// Credentials are per agent and checked in `create_agent`.
  async fn validate_credentials(&self) -> bool {
    true
  }
}

pub struct CommandAgent {
  name: String,
  agent_type: String,
  model: Option<String>,
  instructions: Option<String>,
  base_url: Option<String>,
  credentials: BTreeMap<String, String>,
  argv: Vec<String>,
  cwd: Option<PathBuf>,
  timeout: Option<Duration>,
  state: Mutex<AgentState>,
}

impl CommandAgent {
  fn set_state(&self, state: AgentState) {
    let mut current = self.state.lock();
    // Terminated is final.
    if *current != AgentState::Terminated {
      *current = state;
    }
  }

  async fn run(&self, prompt: &str) -> ProviderResult<Option<Message>> {
    if self.state() == AgentState::Terminated {
      return Err(ProviderError::other(format!(
        "agent `{}` has been shut down",
        self.name
      )));
    }
    self.set_state(AgentState::Processing);
    let result = self.run_inner(prompt).await;
    self.set_state(if result.is_ok() {
      AgentState::Idle
    } else {
      AgentState::Failed
    });
    result
  }

  async fn run_inner(&self, prompt: &str) -> ProviderResult<Option<Message>> {
    let mut env = build_env(
      &self.name,
      prompt,
      self.model.as_deref(),
      self.instructions.as_deref(),
    );
    if let Some(url) = &self.base_url {
      env.insert("ORCHESTRA_BASE_URL".to_string(), url.clone());
    }
    let argv = substitute_tokens(&self.argv, &env);
    let (program, args) = argv
      .split_first()
      .ok_or_else(|| ProviderError::Config("command must not be empty".to_string()))?;

    let mut cmd = Command::new(program);
    cmd
      .args(args)
      .envs(&self.credentials)
      .envs(&env)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(cwd) = &self.cwd {
      cmd.current_dir(cwd);
    }

    debug!(event = "command_agent_exec", agent = %self.name, program = %program, "running agent command");
    let mut child = cmd
      .spawn()
      .map_err(|e| ProviderError::Config(format!("failed to launch `{program}`: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
      let bytes = prompt.as_bytes().to_vec();
      tokio::spawn(async move {
        // The command may exit without reading its input.
        let _ = stdin.write_all(&bytes).await;
      });
    }

    let output = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(res) => res,
        Err(_) => {
          warn!(event = "command_agent_timeout", agent = %self.name, timeout_secs = limit.as_secs(), "agent command timed out");
          return Err(ProviderError::Timeout(format!(
            "`{program}` did not finish within {}s",
            limit.as_secs()
          )));
        }
      },
      None => child.wait_with_output().await,
    }
    .map_err(|e| ProviderError::other(format!("waiting for `{program}` failed: {e}")))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      let message = if stderr.is_empty() {
        format!("`{program}` exited with {}", output.status)
      } else {
        stderr
      };
      return Err(ProviderError::api(message, None));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
      return Ok(None);
    }
    Ok(Some(
      Message::reply(&self.name, stdout).with_metadata("exit_code", serde_json::json!(0)),
    ))
  }
}

#[async_trait]
impl Agent for CommandAgent {
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
    stream::once(async move { self.run(&message.content).await })
      .filter_map(|res| async move { res.transpose() })
      .boxed()
  }

  async fn shutdown(&self) -> ProviderResult<()> {
    *self.state.lock() = AgentState::Terminated;
    Ok(())
  }
}

/// Environment exported to the command and used for `$TOKEN` substitution.
pub fn build_env(
  agent: &str,
  prompt: &str,
  model: Option<&str>,
  instructions: Option<&str>,
) -> HashMap<String, String> {
  let mut env = HashMap::new();
  env.insert("ORCHESTRA_AGENT".to_string(), agent.to_string());
  env.insert("ORCHESTRA_PROMPT".to_string(), prompt.to_string());
  if let Some(value) = model {
    env.insert("ORCHESTRA_MODEL".to_string(), value.to_string());
  }
  if let Some(value) = instructions {
    env.insert("ORCHESTRA_INSTRUCTIONS".to_string(), value.to_string());
  }
  env
}

pub fn substitute_tokens(args: &[String], env: &HashMap<String, String>) -> Vec<String> {
  // Longest keys first so `$ORCHESTRA_PROMPT` never clips a longer token.
  let mut keys: Vec<&String> = env.keys().collect();
  keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
  args
    .iter()
    .map(|arg| {
      let mut substituted = arg.clone();
      for key in &keys {
        let token = format!("${key}");
        if substituted.contains(&token) {
          substituted = substituted.replace(&token, &env[*key]);
        }
      }
      substituted
    })
    .collect()
}
