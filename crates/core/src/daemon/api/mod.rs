use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use jsonrpsee::server::RpcModule;
use jsonrpsee::types::ErrorObjectOwned;
use tokio::sync::watch;

use crate::engine::{EngineError, OrchestrationEngine};
use crate::rpc::ErrorKind;

pub mod agents;
pub mod daemon;

/// Shared state behind every RPC method on both transports.
#[derive(Clone)]
pub struct DaemonContext {
  pub engine: Arc<OrchestrationEngine>,
  pub socket_path: PathBuf,
  pub http_addr: SocketAddr,
  pub shutdown_tx: watch::Sender<bool>,
}

pub fn build_module(ctx: DaemonContext) -> RpcModule<DaemonContext> {
  let mut module = RpcModule::new(ctx);
  daemon::register(&mut module);
  agents::register(&mut module);
  module
}

pub(crate) fn rpc_error(kind: ErrorKind, message: impl Into<String>) -> ErrorObjectOwned {
  ErrorObjectOwned::owned(kind.code(), message.into(), Some(serde_json::json!({ "kind": kind })))
}

pub(crate) fn engine_error(err: EngineError) -> ErrorObjectOwned {
  rpc_error(ErrorKind::from(&err), err.to_string())
}
