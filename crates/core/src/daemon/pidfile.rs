use std::fs;
use std::io;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// What a PID file says about a previous daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidState {
  Absent,
  /// The file exists but names no live process (or no parseable pid).
  Stale(Option<i32>),
  Running(i32),
}

pub fn inspect(path: &Path) -> io::Result<PidState> {
  let raw = match fs::read_to_string(path) {
    Ok(s) => s,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PidState::Absent),
    Err(e) => return Err(e),
  };
  match raw.trim().parse::<i32>() {
    Ok(pid) if is_alive(pid) => Ok(PidState::Running(pid)),
    Ok(pid) => Ok(PidState::Stale(Some(pid))),
    Err(_) => Ok(PidState::Stale(None)),
  }
}

/// Signal 0 probe. EPERM means the process exists under another user.
pub fn is_alive(pid: i32) -> bool {
  if pid <= 0 {
    return false;
  }
  match kill(Pid::from_raw(pid), None) {
    Ok(()) => true,
    Err(Errno::EPERM) => true,
    Err(_) => false,
  }
}

pub fn write(path: &Path, pid: u32) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(path, format!("{pid}\n"))
}

/// Remove the file only if it still records `pid`.
pub fn remove_if_owned(path: &Path, pid: u32) -> io::Result<()> {
  match fs::read_to_string(path) {
    Ok(s) if s.trim() == pid.to_string() => fs::remove_file(path),
    Ok(_) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}
