fn main() {
  // Initialize structured logging early
  let root = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
  let cfg = orchestra_core::config::load(Some(&root))
    .unwrap_or_else(|_| orchestra_core::config::Config::default());
  if let Ok(paths) = orchestra_core::config::resolve_runtime_paths(&cfg) {
    let _ = orchestra_core::logging::init(&paths.logs_path, cfg.log_level);
  }

  cli::run();
}
