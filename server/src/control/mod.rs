//! JSON-lines control socket.
//!
//! One request per line, one response per line. A connection may carry any
//! number of requests; `shutdown` closes it after answering.

use std::path::{Path, PathBuf};

use chesslamp_proto::{read_message, write_message, ControlRequest, ControlResponse, ProtoError};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::session::{MonitorError, MonitorHandle};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to bind control socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
    monitor: MonitorHandle,
    shutdown_tx: mpsc::Sender<()>,
}

impl ControlServer {
    /// Bind the socket, replacing a stale one left by an earlier run.
    pub fn bind(
        path: &Path,
        monitor: MonitorHandle,
        shutdown_tx: mpsc::Sender<()>,
    ) -> Result<Self, ControlError> {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path).map_err(|source| ControlError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Control socket listening on {}", path.display());
        Ok(Self {
            listener,
            path: path.to_path_buf(),
            monitor,
            shutdown_tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        self.monitor.clone(),
                        self.shutdown_tx.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept control connection");
                }
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    monitor: MonitorHandle,
    shutdown_tx: mpsc::Sender<()>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let request = match read_message::<_, ControlRequest>(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(ProtoError::Json(e)) => {
                let response = ControlResponse::Error {
                    message: format!("Malformed request: {e}"),
                };
                if write_message(&mut writer, &response).await.is_err() {
                    break;
                }
                continue;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Control connection dropped");
                break;
            }
        };

        tracing::debug!(?request, "Control request");
        let shutdown = matches!(request, ControlRequest::Shutdown);
        let response = dispatch(&monitor, request).await;
        if write_message(&mut writer, &response).await.is_err() {
            break;
        }
        if shutdown {
            let _ = shutdown_tx.send(()).await;
            break;
        }
    }
}

pub async fn dispatch(monitor: &MonitorHandle, request: ControlRequest) -> ControlResponse {
    let result: Result<ControlResponse, MonitorError> = match request {
        ControlRequest::Status => monitor.status().await.map(ControlResponse::Status),
        ControlRequest::Enable => monitor.enable().await.map(|()| ControlResponse::Ok),
        ControlRequest::Disable => monitor.disable().await.map(|()| ControlResponse::Ok),
        ControlRequest::SetTheme { name } => {
            monitor.set_theme(name).await.map(|()| ControlResponse::Ok)
        }
        ControlRequest::SetGradualDim {
            enabled,
            duration_ms,
        } => monitor
            .set_gradual_dim(enabled, duration_ms)
            .await
            .map(|()| ControlResponse::Ok),
        ControlRequest::Shutdown => Ok(ControlResponse::Ok),
    };
    result.unwrap_or_else(|e| ControlResponse::Error {
        message: e.to_string(),
    })
}
