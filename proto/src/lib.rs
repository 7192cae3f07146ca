//! Control protocol between the `chesslamp` CLI and the daemon.
//!
//! One JSON object per line over a Unix domain socket. The client writes a
//! [`ControlRequest`], the daemon answers with exactly one
//! [`ControlResponse`].

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Default socket path for daemon communication.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/chesslamp.sock";

/// Socket path, honouring `CHESSLAMP_SOCKET_PATH`.
pub fn socket_path() -> PathBuf {
    std::env::var_os("CHESSLAMP_SOCKET_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ProtoResult<T> = Result<T, ProtoError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ControlRequest {
    Status,
    Enable,
    /// Restore the lamp and stop watching for games.
    Disable,
    SetTheme {
        name: String,
    },
    SetGradualDim {
        enabled: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum ControlResponse {
    Status(StatusReport),
    Ok,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub enabled: bool,
    pub theme: Option<String>,
    pub gradual_dim_enabled: bool,
    pub gradual_dim_duration_ms: u64,
    pub session: Option<SessionReport>,
    pub effect: Option<EffectReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub game_id: String,
    pub viewer: String,
    pub side_to_move: String,
    pub move_count: u32,
    pub in_check: bool,
    /// `"ongoing"` or `"ended"`.
    pub status: String,
    pub result: Option<String>,
    /// Viewer's remaining clock, if the game is timed.
    pub viewer_clock_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectReport {
    pub kind: String,
    pub pattern: String,
    pub color: String,
    pub brightness: u8,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "enabled:      {}", self.enabled)?;
        writeln!(f, "theme:        {}", self.theme.as_deref().unwrap_or("(none)"))?;
        writeln!(
            f,
            "gradual dim:  {} ({} ms)",
            if self.gradual_dim_enabled { "on" } else { "off" },
            self.gradual_dim_duration_ms
        )?;
        match &self.session {
            Some(s) => {
                write!(
                    f,
                    "session:      {} as {}, {} to move, ply {}, {}",
                    s.game_id, s.viewer, s.side_to_move, s.move_count, s.status
                )?;
                if s.in_check {
                    write!(f, ", check")?;
                }
                if let Some(result) = &s.result {
                    write!(f, ", result {}", result)?;
                }
                if let Some(ms) = s.viewer_clock_ms {
                    write!(f, ", clock {:.1}s", ms as f64 / 1000.0)?;
                }
                writeln!(f)?;
            }
            None => writeln!(f, "session:      (none)")?,
        }
        match &self.effect {
            Some(e) => write!(
                f,
                "effect:       {} {} {} @ {}%",
                e.kind, e.pattern, e.color, e.brightness
            ),
            None => write!(f, "effect:       (none)"),
        }
    }
}

/// Write one message followed by a newline.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> ProtoResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message; `None` on a clean end of stream.
pub async fn read_message<R, T>(reader: &mut R) -> ProtoResult<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_string(&ControlRequest::SetTheme {
            name: "royal".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"request":"set_theme","name":"royal"}"#);

        let parsed: ControlRequest =
            serde_json::from_str(r#"{"request":"set_gradual_dim","enabled":false}"#).unwrap();
        assert_eq!(
            parsed,
            ControlRequest::SetGradualDim {
                enabled: false,
                duration_ms: None
            }
        );
    }

    #[tokio::test]
    async fn test_messages_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let (_, mut client_write) = tokio::io::split(client);
        let (server_read, _) = tokio::io::split(server);
        let mut server_read = BufReader::new(server_read);

        write_message(&mut client_write, &ControlRequest::Status)
            .await
            .unwrap();
        write_message(&mut client_write, &ControlRequest::Shutdown)
            .await
            .unwrap();
        drop(client_write);

        let first: Option<ControlRequest> = read_message(&mut server_read).await.unwrap();
        let second: Option<ControlRequest> = read_message(&mut server_read).await.unwrap();
        assert_eq!(first, Some(ControlRequest::Status));
        assert_eq!(second, Some(ControlRequest::Shutdown));
    }

    #[test]
    fn test_status_display_without_session() {
        let report = StatusReport {
            enabled: true,
            theme: None,
            gradual_dim_enabled: false,
            gradual_dim_duration_ms: 1500,
            session: None,
            effect: None,
        };
        let text = report.to_string();
        assert!(text.contains("session:      (none)"));
        assert!(text.contains("gradual dim:  off (1500 ms)"));
    }
}
