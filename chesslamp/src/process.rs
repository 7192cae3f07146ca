//! PID file operations for detecting and signalling the daemon.

use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to access PID file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid PID file content: expected integer, got '{0}'")]
    InvalidContent(String),

    #[error("failed to send {signal} to process {pid}: {source}")]
    Signal {
        pid: i32,
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// How `stop` ends the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Graceful: the daemon restores the lamp before exiting.
    Term,
    Kill,
}

impl StopSignal {
    fn raw(self) -> libc::c_int {
        match self {
            StopSignal::Term => libc::SIGTERM,
            StopSignal::Kill => libc::SIGKILL,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StopSignal::Term => "SIGTERM",
            StopSignal::Kill => "SIGKILL",
        }
    }
}

pub fn read_pid(pid_path: &Path) -> Result<i32, ProcessError> {
    let content = fs::read_to_string(pid_path)?;
    content
        .trim()
        .parse::<i32>()
        .map_err(|_| ProcessError::InvalidContent(content.trim().to_string()))
}

pub fn write_pid(pid_path: &Path, pid: u32) -> Result<(), ProcessError> {
    fs::write(pid_path, format!("{}\n", pid))?;
    Ok(())
}

fn process_exists(pid: i32) -> bool {
    // SAFETY: signal 0 only checks existence and permission.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Whether the PID file names a live process.
pub fn is_daemon_running(pid_path: &Path) -> bool {
    match read_pid(pid_path) {
        Ok(pid) => process_exists(pid),
        Err(_) => false,
    }
}

/// Remove the PID file if the process it names is gone.
pub fn remove_stale_pid(pid_path: &Path) -> Result<(), ProcessError> {
    if pid_path.exists() && !is_daemon_running(pid_path) {
        fs::remove_file(pid_path)?;
    }
    Ok(())
}

pub fn send_signal(pid: i32, signal: StopSignal) -> Result<(), ProcessError> {
    // SAFETY: kill(2) with a PID we spawned and recorded ourselves.
    let result = unsafe { libc::kill(pid, signal.raw()) };
    if result != 0 {
        return Err(ProcessError::Signal {
            pid,
            signal: signal.name(),
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Far above any default pid_max.
    const DEAD_PID: &str = "999999\n";

    #[test]
    fn test_read_pid_valid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("pid");
        write_pid(&pid_path, 12345).unwrap();

        assert_eq!(read_pid(&pid_path).unwrap(), 12345);
    }

    #[test]
    fn test_read_pid_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("pid");
        fs::write(&pid_path, "not_a_pid\n").unwrap();

        assert!(matches!(
            read_pid(&pid_path),
            Err(ProcessError::InvalidContent(s)) if s == "not_a_pid"
        ));
    }

    #[test]
    fn test_read_pid_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("nonexistent");

        assert!(matches!(read_pid(&pid_path), Err(ProcessError::Io(_))));
    }

    #[test]
    fn test_is_daemon_running_current() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("pid");
        write_pid(&pid_path, std::process::id()).unwrap();

        assert!(is_daemon_running(&pid_path));
    }

    #[test]
    fn test_is_daemon_running_dead() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("pid");
        fs::write(&pid_path, DEAD_PID).unwrap();

        assert!(!is_daemon_running(&pid_path));
    }

    #[test]
    fn test_remove_stale_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("pid");
        fs::write(&pid_path, DEAD_PID).unwrap();

        remove_stale_pid(&pid_path).unwrap();
        assert!(!pid_path.exists());
    }

    #[test]
    fn test_remove_stale_pid_keeps_live_process() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("pid");
        write_pid(&pid_path, std::process::id()).unwrap();

        remove_stale_pid(&pid_path).unwrap();
        assert!(pid_path.exists());
    }

    #[test]
    fn test_remove_stale_pid_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        remove_stale_pid(&temp_dir.path().join("nonexistent")).unwrap();
    }

    #[test]
    fn test_signal_to_dead_process_fails() {
        let err = send_signal(999_999, StopSignal::Term).unwrap_err();
        assert!(matches!(err, ProcessError::Signal { pid: 999_999, signal: "SIGTERM", .. }));
    }
}
