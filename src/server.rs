//! Serving side of the plugin protocol.
//!
//! [`VolumeServer`] exposes a [`Driver`](crate::driver::Driver) on a unix
//! socket through [`DriverService`], the way a plugin process would.
use crate::error::VolDriverError;
use crate::signal::recv_shutdown;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tracing::{error, info};

pub mod local;
pub mod service;

pub use local::LocalDriver;
pub use service::DriverService;

pub struct VolumeServer {
    socket: PathBuf,
    service: DriverService,
}

impl VolumeServer {
    pub fn new(socket: impl Into<PathBuf>, service: DriverService) -> Self {
        Self {
            socket: socket.into(),
            service,
        }
    }

    /// Serves until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), VolDriverError> {
        let listener = self.bind().await?;
        info!(socket = ?self.socket, "volume plugin listening");

        serve(listener, self.service.clone(), async {
            if let Err(e) = recv_shutdown().await {
                error!("failed to install signal handlers: {}", e);
            }
        })
        .await;
        Ok(())
    }

    /// Binds the socket, replacing a stale socket file left by a previous run.
    pub async fn bind(&self) -> Result<UnixListener, VolDriverError> {
        ensure_socket_path(&self.socket).await?;
        Ok(UnixListener::bind(&self.socket)?)
    }
}

impl Drop for VolumeServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket);
    }
}

/// Accepts connections on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: UnixListener, service: DriverService, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let svc = service.clone();

                        tokio::task::spawn(async move {
                            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                                error!("Error serving connection: {:?}", err);
                            }
                        });
                    }
                    Err(e) => error!("Socket accept error: {}", e),
                }
            }

            _ = &mut shutdown => {
                info!("shutting down volume plugin");
                break;
            }
        }
    }
}

async fn ensure_socket_path(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        info!("Removing existing socket file: {:?}", path);
        tokio::fs::remove_file(path).await?;
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
