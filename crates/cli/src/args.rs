use std::path::PathBuf;

use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use orchestra_core::domain::AgentState;

#[derive(Debug, Parser)]
#[command(version, about = "Orchestra CLI", long_about = None, bin_name = "orchestra")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Daemon related commands
  Daemon(DaemonArgs),
  /// Create a new agent
  Spawn(SpawnArgs),
  /// List running agents
  List(ListArgs),
  /// Show one agent
  Info(NameArg),
  /// Send a message to an agent and print its replies
  Message(MessageArgs),
  /// Show the message history of an agent
  History(HistoryArgs),
  /// Shut down one agent, or all of them with --all
  Shutdown(ShutdownArgs),
  /// Spawn an agent, send it one prompt, and shut it down
  Task(TaskArgs),
  /// List known providers
  Providers,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct AgentOpts {
  /// Provider that creates the agent (defaults to the agent type)
  #[arg(long)]
  pub provider: Option<String>,
  /// Free-form agent type
  #[arg(long = "agent-type")]
  pub agent_type: Option<String>,
  #[arg(long)]
  pub model: Option<String>,
  /// System instructions for the agent
  #[arg(long)]
  pub instructions: Option<String>,
  #[arg(long = "base-url")]
  pub base_url: Option<String>,
  /// Working directory for command agents
  #[arg(long)]
  pub cwd: Option<PathBuf>,
  /// Named command preset (command provider)
  #[arg(long, conflicts_with = "command")]
  pub preset: Option<String>,
  /// Command line to run per message (command provider)
  #[arg(long, num_args = 1.., allow_hyphen_values = true)]
  pub command: Vec<String>,
  /// Credential as KEY=VALUE (repeatable)
  #[arg(long = "credential", value_parser = parse_key_value)]
  pub credentials: Vec<(String, String)>,
  /// Credential the agent needs; taken from --credential or the daemon's environment (repeatable)
  #[arg(long = "require-env")]
  pub require_env: Vec<String>,
  /// Per-message timeout in seconds (command provider)
  #[arg(long = "timeout")]
  pub timeout_secs: Option<u64>,
}

#[derive(Debug, ClapArgs)]
pub struct SpawnArgs {
  /// Unique agent name
  pub name: String,
  #[command(flatten)]
  pub opts: AgentOpts,
}

#[derive(Debug, ClapArgs)]
pub struct ListArgs {
  #[arg(long, value_enum)]
  pub state: Option<StateArg>,
  #[arg(long)]
  pub provider: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
  Idle,
  Processing,
  Restarting,
  Failed,
  Terminated,
}

impl From<StateArg> for AgentState {
  fn from(s: StateArg) -> Self {
    match s {
      StateArg::Idle => AgentState::Idle,
      StateArg::Processing => AgentState::Processing,
      StateArg::Restarting => AgentState::Restarting,
      StateArg::Failed => AgentState::Failed,
      StateArg::Terminated => AgentState::Terminated,
    }
  }
}

#[derive(Debug, ClapArgs)]
pub struct NameArg {
  pub name: String,
}

#[derive(Debug, ClapArgs)]
pub struct MessageArgs {
  pub name: String,
  pub content: String,
}

#[derive(Debug, ClapArgs)]
pub struct HistoryArgs {
  pub name: String,
  /// Only show the last N messages
  #[arg(long)]
  pub limit: Option<usize>,
}

#[derive(Debug, ClapArgs)]
pub struct ShutdownArgs {
  #[arg(required_unless_present = "all", conflicts_with = "all")]
  pub name: Option<String>,
  #[arg(long)]
  pub all: bool,
}

#[derive(Debug, ClapArgs)]
pub struct TaskArgs {
  pub name: String,
  pub prompt: String,
  #[command(flatten)]
  pub opts: AgentOpts,
}

#[derive(Debug, ClapArgs)]
pub struct DaemonArgs {
  #[command(subcommand)]
  pub command: DaemonSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum DaemonSubcommand {
  /// Show daemon status
  Status,
  /// Start the daemon
  Start,
  /// Stop the daemon
  Stop,
  /// Run the daemon (foreground)
  Run,
  /// Restart the daemon
  Restart,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
    _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
  }
}

impl Cli {
  pub fn print_help_and_exit() {
    let mut cmd = Cli::command();
    cmd.print_help().expect("print help");
    println!();
  }
}
