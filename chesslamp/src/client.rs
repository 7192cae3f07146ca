//! Control requests to the running daemon.

use std::path::Path;
use std::time::Duration;

use chesslamp_proto::{read_message, write_message, ControlRequest, ControlResponse, ProtoError};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::time::MissedTickBehavior;

#[derive(Debug, thiserror::Error)]
pub enum ControlClientError {
    #[error("cannot reach daemon at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error("daemon closed the connection without answering")]
    NoResponse,

    #[error("{0}")]
    Rejected(String),

    #[error("daemon at {path} not ready after {waited:?}: {last}")]
    NotReady {
        path: String,
        waited: Duration,
        last: String,
    },
}

/// Send `request` and wait for its single response. An `Error` response
/// becomes [`ControlClientError::Rejected`].
pub async fn send_request(
    socket_path: &Path,
    request: &ControlRequest,
) -> Result<ControlResponse, ControlClientError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|source| ControlClientError::Connect {
            path: socket_path.display().to_string(),
            source,
        })?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    tracing::debug!(?request, "Sending control request");
    write_message(&mut write_half, request).await?;
    match read_message(&mut reader).await? {
        Some(ControlResponse::Error { message }) => Err(ControlClientError::Rejected(message)),
        Some(response) => Ok(response),
        None => Err(ControlClientError::NoResponse),
    }
}

/// Ask for `Status` every `poll_interval` until the daemon answers, giving up
/// after `timeout`.
pub async fn wait_until_ready(
    socket_path: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), ControlClientError> {
    let mut ticks = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = None;

    let attempts = async {
        loop {
            ticks.tick().await;
            match send_request(socket_path, &ControlRequest::Status).await {
                Ok(_) => return,
                Err(e) => {
                    tracing::debug!(error = %e, "Daemon not ready yet");
                    last = Some(e);
                }
            }
        }
    };
    if tokio::time::timeout(timeout, attempts).await.is_ok() {
        return Ok(());
    }

    Err(ControlClientError::NotReady {
        path: socket_path.display().to_string(),
        waited: timeout,
        last: last.map_or_else(|| "no attempt completed".to_string(), |e| e.to_string()),
    })
}
