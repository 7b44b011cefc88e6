//! Core library for the Orchestra agent orchestrator.
//!
//! Holds the agent domain model, the provider and agent registries, the
//! orchestration engine with its conversation history, configuration and
//! logging, and the daemon that exposes the engine over a Unix socket and a
//! loopback HTTP listener speaking JSON-RPC.
//!
//! Quick start:
//! - Build an engine with `engine::OrchestrationEngine::new(providers)`.
//! - Host it with `orchestra_core::daemon::start(daemon_config, engine)`.
//! - Load config via `orchestra_core::config::load(Some(project_root))`.

pub mod config;
pub mod daemon;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod providers;
pub mod rpc;
