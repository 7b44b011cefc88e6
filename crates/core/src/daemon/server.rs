use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;

use jsonrpsee::server::{self, RpcModule};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::watch;
use tracing::{error, info};

use super::DaemonError;
use super::api::DaemonContext;

/// A listener whose connections carry HTTP/1.1 JSON-RPC.
pub(crate) trait Transport: Send + 'static {
  type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

  fn accept(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

impl Transport for UnixListener {
  type Stream = tokio::net::UnixStream;

  async fn accept(&self) -> io::Result<Self::Stream> {
    UnixListener::accept(self).await.map(|(stream, _)| stream)
  }
}

impl Transport for TcpListener {
  type Stream = tokio::net::TcpStream;

  async fn accept(&self) -> io::Result<Self::Stream> {
    TcpListener::accept(self).await.map(|(stream, _)| stream)
  }
}

pub(crate) struct Listeners {
  pub unix: UnixListener,
  pub tcp: TcpListener,
  pub http_addr: SocketAddr,
}

/// Bind the Unix socket (replacing a leftover socket file) and the loopback
/// HTTP port. Either failing fails both.
pub(crate) async fn bind(socket_path: &Path, http_port: u16) -> Result<Listeners, DaemonError> {
  if let Some(parent) = socket_path.parent() {
    fs::create_dir_all(parent)?;
  }
  // Remove stale socket if present
  let _ = fs::remove_file(socket_path);

  let unix = UnixListener::bind(socket_path).map_err(|source| DaemonError::Bind {
    transport: "unix",
    target: socket_path.display().to_string(),
    source,
  })?;

  let addr = SocketAddr::from(([127, 0, 0, 1], http_port));
  let tcp = match TcpListener::bind(addr).await {
    Ok(tcp) => tcp,
    Err(source) => {
      drop(unix);
      let _ = fs::remove_file(socket_path);
      return Err(DaemonError::Bind {
        transport: "http",
        target: addr.to_string(),
        source,
      });
    }
  };
  let http_addr = tcp.local_addr()?;

  Ok(Listeners {
    unix,
    tcp,
    http_addr,
  })
}

/// Accept loop for one transport. Returns when `stop_rx` fires or accepting
/// fails.
pub(crate) async fn serve<L: Transport>(
  transport: &'static str,
  listener: L,
  module: RpcModule<DaemonContext>,
  mut stop_rx: watch::Receiver<bool>,
) -> io::Result<()> {
  let svc_builder = server::Server::builder().to_service_builder();
  let (stop_handle, server_handle) = server::stop_channel();

  info!(event = "transport_started", transport, "transport accepting connections");

  let result = loop {
    tokio::select! {
      _ = stop_rx.changed() => {
        break Ok(());
      }
      res = listener.accept() => {
        match res {
          Ok(stream) => {
            let svc = svc_builder.clone().build(module.clone(), stop_handle.clone());
            tokio::spawn(async move {
              if let Err(e) = server::serve(stream, svc).await {
                error!(transport, error = %e, "serve error");
              }
            });
          }
          Err(e) => {
            error!(event = "transport_failed", transport, error = %e, "accept error");
            break Err(e);
          }
        }
      }
    }
  };

  let _ = server_handle.stop();
  info!(event = "transport_stopped", transport, "transport stopped");
  result
}
