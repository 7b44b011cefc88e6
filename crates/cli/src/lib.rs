pub mod args;
pub mod commands;
pub mod rpc;
pub mod util;

use std::io::IsTerminal;

use clap::Parser;

use args::{Commands, DaemonSubcommand};

pub fn run() {
  // If no additional args, show help and exit 0
  if std::env::args_os().len() == 1 {
    args::Cli::print_help_and_exit();
    return;
  }

  if !std::io::stdout().is_terminal() {
    yansi::disable();
  }

  // Parse arguments; this will also handle --help/--version.
  let cli = args::Cli::parse();
  match cli.command {
    Some(Commands::Daemon(daemon)) => match daemon.command {
      DaemonSubcommand::Status => commands::daemon::print_status(),
      DaemonSubcommand::Start => commands::daemon::start_daemon(),
      DaemonSubcommand::Stop => commands::daemon::stop_daemon(),
      DaemonSubcommand::Run => commands::daemon::run_daemon_foreground(),
      DaemonSubcommand::Restart => commands::daemon::restart_daemon(),
    },
    Some(Commands::Spawn(a)) => commands::agents::spawn(a),
    Some(Commands::List(a)) => commands::agents::list(a),
    Some(Commands::Info(a)) => commands::agents::info(&a.name),
    Some(Commands::Message(a)) => commands::agents::message(a),
    Some(Commands::History(a)) => commands::agents::history(a),
    Some(Commands::Shutdown(a)) => commands::agents::shutdown(a),
    Some(Commands::Task(a)) => commands::agents::task(a),
    Some(Commands::Providers) => commands::agents::providers(),
    None => {
      // No subcommand provided; show help
      args::Cli::print_help_and_exit();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::{CommandFactory, Parser, error::ErrorKind};

  #[test]
  fn help_flag_triggers_displayhelp() {
    let err = args::Cli::try_parse_from(["orchestra", "--help"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DisplayHelp);
  }

  #[test]
  fn version_flag_triggers_displayversion() {
    let err = args::Cli::try_parse_from(["orchestra", "--version"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DisplayVersion);
  }

  #[test]
  fn command_factory_builds() {
    args::Cli::command().debug_assert();
  }

  #[test]
  fn daemon_subcommands_parse() {
    for sub in ["status", "start", "stop", "run", "restart"] {
      let cli = args::Cli::try_parse_from(["orchestra", "daemon", sub]).unwrap();
      assert!(matches!(cli.command, Some(Commands::Daemon(_))));
    }
  }
}
