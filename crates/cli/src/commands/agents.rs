use std::collections::BTreeMap;

use orchestra_core::domain::{AgentInfo, AgentState, Message, ShutdownReport};
use orchestra_core::rpc::{ListParams, SpawnParams, TaskParams};
use serde_json::json;
use yansi::Paint;

use crate::args::{AgentOpts, HistoryArgs, ListArgs, MessageArgs, ShutdownArgs, SpawnArgs, TaskArgs};
use crate::util::daemon_proc::{client, current_thread_rt, resolve_or_exit};
use crate::util::errors::bail;

/// Build spawn parameters, filling provider and model from config when unset.
pub fn spawn_params(
  name: String,
  opts: AgentOpts,
  default_provider: Option<&str>,
  default_model: Option<&str>,
) -> SpawnParams {
  let mut extra = BTreeMap::new();
  if !opts.command.is_empty() {
    extra.insert("command".to_string(), json!(opts.command));
  }
  if let Some(preset) = opts.preset {
    extra.insert("preset".to_string(), json!(preset));
  }
  if let Some(secs) = opts.timeout_secs {
    extra.insert("timeout_secs".to_string(), json!(secs));
  }
  let require_env = (!opts.require_env.is_empty()).then(|| json!(opts.require_env));

  // --command/--preset imply the command provider.
  let implied = (!extra.is_empty()).then_some("command");
  if let Some(names) = require_env {
    extra.insert("require_env".to_string(), names);
  }

  let fallback = match opts.agent_type {
    Some(_) => None,
    None => default_provider,
  };
  let provider = opts
    .provider
    .or_else(|| implied.or(fallback).map(str::to_string));
  let agent_type = opts
    .agent_type
    .or_else(|| provider.clone())
    .unwrap_or_else(|| "echo".to_string());

  SpawnParams {
    name,
    agent_type,
    provider,
    model: opts.model.or_else(|| default_model.map(str::to_string)),
    instructions: opts.instructions,
    base_url: opts.base_url,
    cwd: opts.cwd,
    credentials: opts.credentials.into_iter().collect(),
    extra,
  }
}

fn state_label(state: AgentState) -> String {
  match state {
    AgentState::Idle => state.as_str().green().to_string(),
    AgentState::Processing | AgentState::Restarting => state.as_str().yellow().to_string(),
    AgentState::Failed => state.as_str().red().to_string(),
    AgentState::Terminated => state.as_str().dim().to_string(),
  }
}

pub fn format_agent_table(agents: &[AgentInfo]) -> String {
  if agents.is_empty() {
    return "No agents running.".to_string();
  }
  let w_name = agents.iter().map(|a| a.name.len()).max().unwrap_or(0).max(4);
  let w_type = agents.iter().map(|a| a.agent_type.len()).max().unwrap_or(0).max(4);
  let w_prov = agents.iter().map(|a| a.provider.len()).max().unwrap_or(0).max(8);
  let mut out = format!(
    "{:<w_name$}  {:<w_type$}  {:<w_prov$}  STATE",
    "NAME", "TYPE", "PROVIDER"
  );
  for a in agents {
    out.push('\n');
    out.push_str(&format!(
      "{:<w_name$}  {:<w_type$}  {:<w_prov$}  {}",
      a.name,
      a.agent_type,
      a.provider,
      state_label(a.state)
    ));
  }
  out
}

pub fn format_message(msg: &Message) -> String {
  format!("[{}] {}", msg.sender.bold(), msg.content)
}

pub fn format_report(report: &ShutdownReport) -> String {
  let total = report.succeeded.len() + report.failed.len();
  let mut out = format!(
    "Shut down {} agents. {} succeeded, {} failed.",
    total,
    report.succeeded.len(),
    report.failed.len()
  );
  for (name, err) in &report.failed {
    out.push_str(&format!("\n  {}: {}", name.red(), err));
  }
  out
}

pub fn spawn(args: SpawnArgs) {
  let (cfg, _) = resolve_or_exit();
  let params = spawn_params(
    args.name,
    args.opts,
    cfg.default_provider.as_deref(),
    cfg.default_model.as_deref(),
  );
  let client = client();
  match current_thread_rt().block_on(client.spawn(params)) {
    Ok(info) => println!(
      "Spawned agent {} ({}, provider {})",
      info.name.green(),
      info.agent_type,
      info.provider
    ),
    Err(e) => bail("spawn", &e),
  }
}

pub fn list(args: ListArgs) {
  let params = ListParams {
    state: args.state.map(Into::into),
    provider: args.provider,
  };
  let client = client();
  match current_thread_rt().block_on(client.list(params)) {
    Ok(agents) => println!("{}", format_agent_table(&agents)),
    Err(e) => bail("list", &e),
  }
}

pub fn info(name: &str) {
  let client = client();
  match current_thread_rt().block_on(client.get(name)) {
    Ok(a) => {
      println!("name:     {}", a.name);
      println!("type:     {}", a.agent_type);
      println!("provider: {}", a.provider);
      println!("state:    {}", state_label(a.state));
    }
    Err(e) => bail("info", &e),
  }
}

pub fn message(args: MessageArgs) {
  let client = client();
  match current_thread_rt().block_on(client.message(&args.name, &args.content)) {
    Ok(replies) if replies.is_empty() => println!("{}", "(no reply)".dim()),
    Ok(replies) => {
      for r in &replies {
        println!("{}", format_message(r));
      }
    }
    Err(e) => bail("message", &e),
  }
}

pub fn history(args: HistoryArgs) {
  let client = client();
  match current_thread_rt().block_on(client.history(&args.name, args.limit)) {
    Ok(msgs) if msgs.is_empty() => println!("No messages for {}.", args.name),
    Ok(msgs) => {
      for m in &msgs {
        println!(
          "{} {}",
          m.timestamp.format("%H:%M:%S").dim(),
          format_message(m)
        );
      }
    }
    Err(e) => bail("history", &e),
  }
}

pub fn shutdown(args: ShutdownArgs) {
  let client = client();
  let rt = current_thread_rt();
  match args.name {
    Some(name) if !args.all => match rt.block_on(client.shutdown(&name)) {
      Ok(()) => println!("Agent {} shut down.", name),
      Err(e) => bail("shutdown", &e),
    },
    _ => match rt.block_on(client.shutdown_all()) {
      Ok(report) => {
        println!("{}", format_report(&report));
        if !report.is_clean() {
          std::process::exit(1);
        }
      }
      Err(e) => bail("shutdown", &e),
    },
  }
}

pub fn task(args: TaskArgs) {
  let (cfg, _) = resolve_or_exit();
  let params = TaskParams {
    agent: spawn_params(
      args.name,
      args.opts,
      cfg.default_provider.as_deref(),
      cfg.default_model.as_deref(),
    ),
    prompt: args.prompt,
  };
  let client = client();
  match current_thread_rt().block_on(client.task(params)) {
    Ok(replies) => {
      for r in &replies {
        println!("{}", format_message(r));
      }
    }
    Err(e) => bail("task", &e),
  }
}

pub fn providers() {
  let client = client();
  match current_thread_rt().block_on(client.providers()) {
    Ok(list) => {
      for p in list {
        let creds = if p.credentials_valid {
          "credentials ok".green().to_string()
        } else {
          "credentials invalid".red().to_string()
        };
        let loaded = if p.loaded { "loaded" } else { "not loaded" };
        println!("{:<12} {:<11} {}", p.name, loaded, creds);
      }
    }
    Err(e) => bail("providers", &e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn opts() -> AgentOpts {
    AgentOpts {
      provider: None,
      agent_type: None,
      model: None,
      instructions: None,
      base_url: None,
      cwd: None,
      preset: None,
      command: Vec::new(),
      credentials: Vec::new(),
      require_env: Vec::new(),
      timeout_secs: None,
    }
  }

  #[test]
  fn plain_spawn_is_an_echo_agent() {
    let p = spawn_params("a".into(), opts(), None, None);
    assert_eq!(p.agent_type, "echo");
    assert_eq!(p.provider, None);
    assert!(p.extra.is_empty());
  }

  #[test]
  fn command_flag_implies_command_provider() {
    let mut o = opts();
    o.command = vec!["cat".into()];
    o.timeout_secs = Some(3);
    let p = spawn_params("a".into(), o, Some("echo"), None);
    assert_eq!(p.provider.as_deref(), Some("command"));
    assert_eq!(p.agent_type, "command");
    assert_eq!(p.extra["command"], json!(["cat"]));
    assert_eq!(p.extra["timeout_secs"], json!(3));
  }

  #[test]
  fn credentials_and_required_names_are_forwarded() {
    let mut o = opts();
    o.command = vec!["tool".into()];
    o.credentials = vec![("API_KEY".into(), "k".into())];
    o.require_env = vec!["API_KEY".into()];
    let p = spawn_params("a".into(), o, None, None);
    assert_eq!(p.credentials.get("API_KEY").map(String::as_str), Some("k"));
    assert_eq!(p.extra["require_env"], json!(["API_KEY"]));
  }

  #[test]
  fn config_defaults_fill_gaps_only() {
    let mut o = opts();
    o.model = Some("m2".into());
    let p = spawn_params("a".into(), o, Some("command"), Some("m1"));
    assert_eq!(p.provider.as_deref(), Some("command"));
    assert_eq!(p.model.as_deref(), Some("m2"));
  }

  #[test]
  fn explicit_agent_type_wins_over_config_provider() {
    let mut o = opts();
    o.agent_type = Some("echo".into());
    let p = spawn_params("a".into(), o, Some("command"), None);
    assert_eq!(p.agent_type, "echo");
    assert_eq!(p.provider, None);
  }

  #[test]
  fn empty_list_has_friendly_text() {
    assert_eq!(format_agent_table(&[]), "No agents running.");
  }

  #[test]
  fn table_lists_every_agent() {
    yansi::disable();
    let agents = vec![
      AgentInfo {
        name: "alpha".into(),
        agent_type: "echo".into(),
        provider: "echo".into(),
        state: AgentState::Idle,
      },
      AgentInfo {
        name: "b".into(),
        agent_type: "command".into(),
        provider: "command".into(),
        state: AgentState::Failed,
      },
    ];
    let out = format_agent_table(&agents);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "alpha  echo     echo      idle");
    assert_eq!(lines[2], "b      command  command   failed");
  }

  #[test]
  fn report_counts_and_names_failures() {
    yansi::disable();
    let mut report = ShutdownReport::default();
    report.succeeded.push("a".into());
    report.failed.insert("b".into(), "boom".into());
    assert_eq!(
      format_report(&report),
      "Shut down 2 agents. 1 succeeded, 1 failed.\n  b: boom"
    );
  }
}
