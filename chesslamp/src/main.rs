//! chesslamp CLI shim: process supervisor and control client.
//!
//! With no subcommand it starts `chesslamp-server` as a background daemon
//! (unless one is already running) and waits until it answers a status
//! request. The other subcommands talk to that daemon over the socket; `stop`
//! falls back to signalling the PID recorded at startup.
//!
//! The socket path comes from `CHESSLAMP_SOCKET_PATH`; see [`config`] for
//! the other tunables.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use chesslamp_proto::{ControlRequest, ControlResponse};
use clap::{Parser, Subcommand};

mod client;
mod config;
mod process;

use process::StopSignal;

#[derive(Parser)]
#[command(name = "chesslamp", about = "Mirror your live Lichess game on a Govee lamp")]
struct Cli {
    /// When omitted, start the daemon if it is not already running.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the daemon's current session and effect.
    Status,
    /// Resume watching for games.
    Enable,
    /// Restore the lamp and stop watching for games.
    Disable,
    /// Switch to a named theme until the next restart.
    Theme {
        name: String,
    },
    /// Fade solid colors in from full brightness.
    Dim {
        /// Turn gradual dimming off.
        #[arg(long)]
        off: bool,
        /// Length of the fade in milliseconds.
        #[arg(long, value_name = "N")]
        duration_ms: Option<u64>,
    },
    /// Stop the running daemon.
    ///
    /// Asks the daemon to shut down so it can restore the lamp. Pass
    /// `--force` to send SIGKILL instead.
    Stop {
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Control(#[from] client::ControlClientError),

    #[error("daemon process error: {0}")]
    Process(#[from] process::ProcessError),

    #[error("daemon process error: {0}")]
    ProcessError(String),

    #[error("unexpected response from daemon: {0:?}")]
    UnexpectedResponse(ControlResponse),
}

/// A binary next to the current executable, else `name` for `PATH` lookup.
fn resolve_sibling_binary(name: &str) -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(name);
            if candidate.exists() {
                return candidate;
            }
        }
    }

    PathBuf::from(name)
}

/// Both daemon output streams go to `log_path`; `/dev/null` discards them.
fn server_log_stdio_for_path(log_path: &Path) -> Result<(Stdio, Stdio), CliError> {
    if log_path == Path::new("/dev/null") {
        return Ok((Stdio::null(), Stdio::null()));
    }

    let stdout_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| CliError::ProcessError(format!("failed to open server log file: {}", e)))?;

    let stderr_file = stdout_file
        .try_clone()
        .map_err(|e| CliError::ProcessError(format!("failed to clone server log file: {}", e)))?;

    Ok((Stdio::from(stdout_file), Stdio::from(stderr_file)))
}

fn server_log_stdio() -> Result<(Stdio, Stdio), CliError> {
    server_log_stdio_for_path(&config::get_server_log_path())
}

/// Spawn the daemon detached and record its PID. Falls back to
/// `cargo run -p chesslamp-server` when the binary is not installed.
fn spawn_server() -> Result<(), CliError> {
    let pid_path = config::get_pid_path();
    process::remove_stale_pid(&pid_path)?;

    let server_bin = resolve_sibling_binary("chesslamp-server");
    let (stdout_stdio, stderr_stdio) = server_log_stdio()?;
    let child = match Command::new(&server_bin)
        .stdin(Stdio::null())
        .stdout(stdout_stdio)
        .stderr(stderr_stdio)
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let (fallback_stdout, fallback_stderr) = server_log_stdio()?;
            Command::new("cargo")
                .args(["run", "-p", "chesslamp-server"])
                .stdin(Stdio::null())
                .stdout(fallback_stdout)
                .stderr(fallback_stderr)
                .spawn()
                .map_err(|spawn_err| {
                    CliError::ProcessError(format!(
                        "failed to spawn server (binary: {}, cargo fallback: {})",
                        e, spawn_err
                    ))
                })?
        }
        Err(e) => {
            return Err(CliError::ProcessError(format!(
                "failed to spawn server binary: {}",
                e
            )))
        }
    };

    process::write_pid(&pid_path, child.id())?;
    Ok(())
}

async fn wait_for_server() -> Result<(), CliError> {
    let timeout = Duration::from_secs(config::get_socket_timeout_secs());
    let poll_interval = Duration::from_millis(config::get_socket_poll_interval_ms());
    client::wait_until_ready(&config::get_socket_path(), timeout, poll_interval).await?;
    Ok(())
}

async fn ensure_running() -> Result<(), CliError> {
    let pid_path = config::get_pid_path();
    tracing::debug!("Socket: {:?}", config::get_socket_path());
    tracing::debug!("PID file: {:?}", pid_path);

    if process::is_daemon_running(&pid_path) {
        tracing::info!("Daemon already running.");
    } else {
        tracing::info!("Daemon not running, starting...");
        spawn_server()?;
    }

    wait_for_server().await?;
    tracing::info!("Daemon ready.");
    Ok(())
}

/// Send a request that answers with a plain `Ok`.
async fn expect_ok(request: ControlRequest) -> Result<(), CliError> {
    match client::send_request(&config::get_socket_path(), &request).await? {
        ControlResponse::Ok => Ok(()),
        other => Err(CliError::UnexpectedResponse(other)),
    }
}

async fn handle_status() -> Result<(), CliError> {
    match client::send_request(&config::get_socket_path(), &ControlRequest::Status).await? {
        ControlResponse::Status(report) => {
            println!("{}", report);
            Ok(())
        }
        other => Err(CliError::UnexpectedResponse(other)),
    }
}

/// Ask the daemon to shut down over the socket; if that fails, or with
/// `force`, signal the recorded PID instead.
async fn handle_stop(force: bool) -> Result<(), CliError> {
    let pid_path = config::get_pid_path();

    if !force {
        match expect_ok(ControlRequest::Shutdown).await {
            Ok(()) => {
                let _ = std::fs::remove_file(&pid_path);
                println!("Daemon stopped.");
                return Ok(());
            }
            Err(e) => tracing::debug!("Shutdown request failed, falling back to signal: {}", e),
        }
    }

    if !process::is_daemon_running(&pid_path) {
        println!("Daemon is not running.");
        return Ok(());
    }

    let signal = if force { StopSignal::Kill } else { StopSignal::Term };
    let pid = process::read_pid(&pid_path)?;
    process::send_signal(pid, signal)?;

    let _ = std::fs::remove_file(&pid_path);
    if force {
        // A killed daemon cannot clean up after itself.
        let _ = std::fs::remove_file(config::get_socket_path());
    }

    println!("Daemon stopped (signal: {}).", signal.name());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => ensure_running().await?,
        Some(Commands::Status) => handle_status().await?,
        Some(Commands::Enable) => {
            expect_ok(ControlRequest::Enable).await?;
            println!("Enabled.");
        }
        Some(Commands::Disable) => {
            expect_ok(ControlRequest::Disable).await?;
            println!("Disabled; lamp restored.");
        }
        Some(Commands::Theme { name }) => {
            expect_ok(ControlRequest::SetTheme { name: name.clone() }).await?;
            println!("Theme set to {}.", name);
        }
        Some(Commands::Dim { off, duration_ms }) => {
            expect_ok(ControlRequest::SetGradualDim {
                enabled: !off,
                duration_ms,
            })
            .await?;
            println!("Gradual dim {}.", if off { "off" } else { "on" });
        }
        Some(Commands::Stop { force }) => handle_stop(force).await?,
    }

    Ok(())
}
