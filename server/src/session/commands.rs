use chesslamp_proto::StatusReport;
use tokio::sync::oneshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MonitorError {
    #[error("Unknown theme '{name}' (available: {available})")]
    UnknownTheme { name: String, available: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Commands sent to the session monitor. Each embeds a oneshot for the reply.
pub enum MonitorCommand {
    GetStatus {
        reply: oneshot::Sender<StatusReport>,
    },
    Enable {
        reply: oneshot::Sender<()>,
    },
    /// Replies once any running session has been ended and the lamp restored.
    Disable {
        reply: oneshot::Sender<()>,
    },
    SetTheme {
        name: String,
        reply: oneshot::Sender<Result<(), MonitorError>>,
    },
    SetGradualDim {
        enabled: bool,
        duration_ms: Option<u64>,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}
