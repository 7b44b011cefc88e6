use jsonrpsee::core::RpcResult;
use jsonrpsee::server::RpcModule;
use tracing::info;

use super::{DaemonContext, engine_error};
use crate::rpc::{
  AgentListResponse, HistoryParams, ListParams, MessageParams, MessagesResponse, NameParams,
  SpawnParams, TaskParams, methods,
};

/// Register the agent lifecycle APIs. Each method is exactly one engine call.
pub fn register(module: &mut RpcModule<DaemonContext>) {
  // ---- agent.spawn ----
  module
    .register_async_method(methods::AGENT_SPAWN, |params, ctx, _ext| async move {
      let p: SpawnParams = params.parse()?;
      let info = ctx
        .engine
        .spawn_agent(p.into_config())
        .await
        .map_err(engine_error)?;
      RpcResult::Ok(serde_json::json!(info))
    })
    .expect("register agent.spawn");

  // ---- agent.list ----
  module
    .register_method(methods::AGENT_LIST, |params, ctx, _ext| -> RpcResult<serde_json::Value> {
      // Filters are optional; no params means list everything.
      let p: ListParams = if params.is_object() {
        params.parse()?
      } else {
        ListParams::default()
      };
      let agents = ctx.engine.list_agents(p.state, p.provider.as_deref());
      Ok(serde_json::json!(AgentListResponse { agents }))
    })
    .expect("register agent.list");

  // ---- agent.get ----
  module
    .register_method(methods::AGENT_GET, |params, ctx, _ext| -> RpcResult<serde_json::Value> {
      let p: NameParams = params.parse()?;
      let info = ctx.engine.get_agent(&p.name).map_err(engine_error)?;
      Ok(serde_json::json!(info))
    })
    .expect("register agent.get");

  // ---- agent.message ----
  module
    .register_async_method(methods::AGENT_MESSAGE, |params, ctx, _ext| async move {
      let p: MessageParams = params.parse()?;
      let messages = ctx
        .engine
        .send_message(&p.name, &p.content)
        .await
        .map_err(engine_error)?;
      RpcResult::Ok(serde_json::json!(MessagesResponse { messages }))
    })
    .expect("register agent.message");

  // ---- agent.history ----
  module
    .register_method(methods::AGENT_HISTORY, |params, ctx, _ext| -> RpcResult<serde_json::Value> {
      let p: HistoryParams = params.parse()?;
      let messages = match p.limit {
        Some(limit) => ctx.engine.get_history_tail(&p.name, limit),
        None => ctx.engine.get_history(&p.name),
      };
      Ok(serde_json::json!(MessagesResponse { messages }))
    })
    .expect("register agent.history");

  // ---- agent.shutdown ----
  module
    .register_async_method(methods::AGENT_SHUTDOWN, |params, ctx, _ext| async move {
      let p: NameParams = params.parse()?;
      ctx
        .engine
        .shutdown_agent(&p.name)
        .await
        .map_err(engine_error)?;
      RpcResult::Ok(serde_json::json!(true))
    })
    .expect("register agent.shutdown");

  // ---- agent.shutdown_all ----
  module
    .register_async_method(methods::AGENT_SHUTDOWN_ALL, |_params, ctx, _ext| async move {
      let report = ctx.engine.shutdown_all().await;
      info!(event = "rpc_shutdown_all", failed = report.failed.len(), "bulk shutdown served");
      RpcResult::Ok(serde_json::json!(report))
    })
    .expect("register agent.shutdown_all");

  // ---- agent.task ----
  module
    .register_async_method(methods::AGENT_TASK, |params, ctx, _ext| async move {
      let p: TaskParams = params.parse()?;
      let messages = ctx
        .engine
        .run_task(p.agent.into_config(), &p.prompt)
        .await
        .map_err(engine_error)?;
      RpcResult::Ok(serde_json::json!(MessagesResponse { messages }))
    })
    .expect("register agent.task");
}
