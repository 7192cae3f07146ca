use chesslamp_proto::StatusReport;
use tokio::sync::{mpsc, oneshot};

use super::commands::{MonitorCommand, MonitorError};

/// Cheap, cloneable handle to the session monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<MonitorCommand>) -> Self {
        Self { cmd_tx }
    }

    pub async fn status(&self) -> Result<StatusReport, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorCommand::GetStatus { reply: tx }).await?;
        rx.await
            .map_err(|_| MonitorError::Internal("Reply dropped".into()))
    }

    pub async fn enable(&self) -> Result<(), MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorCommand::Enable { reply: tx }).await?;
        rx.await
            .map_err(|_| MonitorError::Internal("Reply dropped".into()))
    }

    pub async fn disable(&self) -> Result<(), MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorCommand::Disable { reply: tx }).await?;
        rx.await
            .map_err(|_| MonitorError::Internal("Reply dropped".into()))
    }

    pub async fn set_theme(&self, name: String) -> Result<(), MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorCommand::SetTheme { name, reply: tx })
            .await?;
        rx.await
            .map_err(|_| MonitorError::Internal("Reply dropped".into()))?
    }

    pub async fn set_gradual_dim(
        &self,
        enabled: bool,
        duration_ms: Option<u64>,
    ) -> Result<(), MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorCommand::SetGradualDim {
            enabled,
            duration_ms,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| MonitorError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(MonitorCommand::Shutdown).await;
    }

    async fn send(&self, cmd: MonitorCommand) -> Result<(), MonitorError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| MonitorError::Internal("Session monitor closed".into()))
    }
}
