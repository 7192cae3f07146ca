//! Configuration for the chesslamp daemon.
//!
//! The config file is JSON. Its location is, in order:
//! 1. `CHESSLAMP_CONFIG` env variable if set
//! 2. `$XDG_CONFIG_HOME/chesslamp/config.json` (or the platform equivalent)
//! 3. `./config.json`
//!
//! When the file does not exist, credentials fall back to the
//! `LICHESS_TOKEN`, `GOVEE_API_KEY`, `GOVEE_DEVICE_MAC` and `GOVEE_DEVICE_IP`
//! environment variables and everything else resolves to defaults.

pub mod resolve;
pub mod source;
pub mod theme;
pub mod watcher;

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use lamp::Rgb;
use serde::{Deserialize, Serialize};

pub use resolve::{ResolvedConfig, RuntimeOverrides};
pub use source::{ConfigSource, FileConfigSource};
pub use watcher::ConfigWatcher;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_DIR_NAME: &str = "chesslamp";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required configuration: {0}")]
    MissingCredentials(String),
    #[error("invalid govee_device_ip '{0}'")]
    InvalidDeviceIp(String),
}

/// Raw contents of the config file. Every field is optional; missing
/// presentation fields are filled in by [`resolve::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub lichess_token: Option<String>,
    pub govee_api_key: Option<String>,
    pub govee_device_mac: Option<String>,
    pub govee_device_ip: Option<String>,
    pub govee_model: Option<String>,

    pub theme: Option<String>,

    pub my_turn_color: Option<Rgb>,
    pub my_turn_brightness: Option<u32>,
    pub opponent_turn_color: Option<Rgb>,
    pub opponent_turn_brightness: Option<u32>,

    pub time_pressure_enabled: Option<bool>,
    /// Seconds.
    pub time_pressure_warning: Option<u64>,
    /// Seconds.
    pub time_pressure_critical: Option<u64>,
    pub time_warning_color: Option<Rgb>,
    pub time_critical_color: Option<Rgb>,
    pub time_pressure_brightness: Option<u32>,

    pub check_detection_enabled: Option<bool>,
    pub check_color: Option<Rgb>,
    pub check_brightness: Option<u32>,
    pub check_blink_enabled: Option<bool>,

    pub move_notification_enabled: Option<bool>,
    pub move_notification_color: Option<Rgb>,
    pub move_notification_brightness: Option<u32>,
    pub move_notification_duration_ms: Option<u64>,

    pub celebration_enabled: Option<bool>,
    pub celebration_win_color: Option<Rgb>,
    pub celebration_draw_color: Option<Rgb>,
    pub celebration_pulse_count: Option<u32>,

    pub restore_color: Option<Rgb>,
    pub restore_brightness: Option<u32>,

    pub gradual_dim_enabled: Option<bool>,
    pub gradual_dim_duration_ms: Option<u64>,
}

/// Opaque credentials and device addressing, checked once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub lichess_token: String,
    pub govee_api_key: String,
    pub govee_device_mac: String,
    pub govee_device_ip: Option<IpAddr>,
    pub govee_model: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl FileConfig {
    /// Credentials from the environment, for when no config file exists.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            lichess_token: var("LICHESS_TOKEN"),
            govee_api_key: var("GOVEE_API_KEY"),
            govee_device_mac: var("GOVEE_DEVICE_MAC"),
            govee_device_ip: var("GOVEE_DEVICE_IP"),
            ..Self::default()
        }
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let token = non_empty(&self.lichess_token);
        let api_key = non_empty(&self.govee_api_key);
        let mac = non_empty(&self.govee_device_mac);

        let missing: Vec<&str> = [
            ("lichess_token", token.is_none()),
            ("govee_api_key", api_key.is_none()),
            ("govee_device_mac", mac.is_none()),
        ]
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| *name)
        .collect();

        match (token, api_key, mac) {
            (Some(lichess_token), Some(govee_api_key), Some(govee_device_mac)) => {
                let govee_device_ip = non_empty(&self.govee_device_ip)
                    .map(|ip| ip.parse().map_err(|_| ConfigError::InvalidDeviceIp(ip)))
                    .transpose()?;
                Ok(Credentials {
                    lichess_token,
                    govee_api_key,
                    govee_device_mac,
                    govee_device_ip,
                    govee_model: non_empty(&self.govee_model),
                })
            }
            _ => Err(ConfigError::MissingCredentials(missing.join(", "))),
        }
    }
}

/// Get the config file path.
///
/// Priority:
/// 1. `CHESSLAMP_CONFIG` env variable if set
/// 2. `<config dir>/chesslamp/config.json`
/// 3. `./config.json` as fallback
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CHESSLAMP_CONFIG") {
        return PathBuf::from(path);
    }

    match dirs::config_dir() {
        Some(dir) => dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    }
}

/// Read the config file, or fall back to the environment when it is absent.
pub fn load_initial(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => FileConfig::parse(path, &contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No config file, using environment");
            Ok(FileConfig::from_env())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
