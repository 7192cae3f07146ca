//! Runtime tunables for the shim.
//!
//! Every value has a compiled default and an environment override. The socket
//! path itself lives in `chesslamp_proto` since the daemon needs it too.

use std::path::PathBuf;

pub use chesslamp_proto::socket_path as get_socket_path;

/// Default PID file path for daemon process tracking.
const DEFAULT_PID_PATH: &str = "/tmp/chesslamp.pid";

/// Default timeout for waiting on socket availability (in seconds).
const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 5;

/// Default poll interval for socket availability checks (in milliseconds).
const DEFAULT_SOCKET_POLL_INTERVAL_MS: u64 = 100;

/// Default daemon log path. `/dev/null` discards all daemon output.
const DEFAULT_SERVER_LOG_PATH: &str = "/dev/null";

/// Get the PID file path.
///
/// Priority:
/// 1. `CHESSLAMP_PID_PATH` env variable if set
/// 2. `/tmp/chesslamp.pid` as fallback
pub fn get_pid_path() -> PathBuf {
    if let Ok(path) = std::env::var("CHESSLAMP_PID_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_PID_PATH)
}

/// Get the socket wait timeout in seconds.
///
/// `CHESSLAMP_SOCKET_TIMEOUT_SECS` overrides the default of 5; an unparsable
/// value falls back to the default.
pub fn get_socket_timeout_secs() -> u64 {
    parse_timeout(std::env::var("CHESSLAMP_SOCKET_TIMEOUT_SECS").ok().as_deref())
}

fn parse_timeout(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_SOCKET_TIMEOUT_SECS)
}

pub fn get_socket_poll_interval_ms() -> u64 {
    DEFAULT_SOCKET_POLL_INTERVAL_MS
}

/// Get the file the daemon's stdout and stderr go to.
///
/// Set `CHESSLAMP_SERVER_LOG_PATH` to capture daemon output, for example
/// `CHESSLAMP_SERVER_LOG_PATH=/tmp/chesslamp-server.log`.
pub fn get_server_log_path() -> PathBuf {
    if let Ok(path) = std::env::var("CHESSLAMP_SERVER_LOG_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_SERVER_LOG_PATH)
}
