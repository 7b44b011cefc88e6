use jsonrpsee::core::RpcResult;
use jsonrpsee::server::RpcModule;
use tracing::info;

use super::DaemonContext;
use crate::rpc::{DaemonStatus, Health, ProviderListResponse, ProviderStatus, methods};

/// Register daemon.status, daemon.health, daemon.shutdown and provider.list.
pub fn register(module: &mut RpcModule<DaemonContext>) {
  module
    .register_method(methods::DAEMON_STATUS, |_params, ctx, _ext| -> RpcResult<serde_json::Value> {
      let status = DaemonStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        pid: std::process::id(),
        socket_path: ctx.socket_path.display().to_string(),
        http_addr: ctx.http_addr.to_string(),
      };
      info!(event = "daemon_status", pid = status.pid, socket = %status.socket_path, version = %status.version, "status served");
      Ok(serde_json::json!(status))
    })
    .expect("register daemon.status");

  module
    .register_method(methods::DAEMON_HEALTH, |_params, ctx, _ext| -> RpcResult<serde_json::Value> {
      Ok(serde_json::json!(Health {
        status: "ok".to_string(),
        agents: ctx.engine.agent_count(),
      }))
    })
    .expect("register daemon.health");

  module
    .register_method(methods::DAEMON_SHUTDOWN, |_params, ctx, _ext| -> RpcResult<serde_json::Value> {
      info!(event = "daemon_shutdown_requested", "shutdown requested via RPC");
      let _ = ctx.shutdown_tx.send(true);
      Ok(serde_json::json!(true))
    })
    .expect("register daemon.shutdown");

  module
    .register_async_method(methods::PROVIDER_LIST, |_params, ctx, _ext| async move {
      let providers = ctx.engine.providers();
      let loaded = providers.list_registered();
      let mut out = Vec::new();
      for name in providers.known() {
        let credentials_valid = match providers.resolve(&name) {
          Ok(p) => p.validate_credentials().await,
          Err(_) => false,
        };
        out.push(ProviderStatus {
          loaded: loaded.contains(&name),
          name,
          credentials_valid,
        });
      }
      RpcResult::Ok(serde_json::json!(ProviderListResponse { providers: out }))
    })
    .expect("register provider.list");
}
