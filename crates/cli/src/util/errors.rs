use yansi::Paint;

use crate::rpc::client;

/// One line describing a failed CLI action. Unreachable daemons always read
/// the same, whatever transport was tried.
pub fn render_rpc_failure(action: &str, err: &client::Error) -> String {
  match err {
    client::Error::DaemonNotRunning => format!("{} failed: {}", action, err),
    client::Error::Remote { kind, message, .. } => {
      format!("{} failed ({}): {}", action, kind, message)
    }
    _ => format!("{} failed: {}", action, err),
  }
}

/// Print the failure to stderr and exit 1.
pub fn bail(action: &str, err: &client::Error) -> ! {
  eprintln!("{}", render_rpc_failure(action, err).red());
  std::process::exit(1);
}
