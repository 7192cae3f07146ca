use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use super::source::{ConfigSource, ConfigVersion};
use super::FileConfig;

pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls a [`ConfigSource`] and publishes every successfully parsed change
/// on a watch channel. A parse failure keeps the previous config.
pub struct ConfigWatcher<S> {
    source: S,
    last_version: Option<ConfigVersion>,
    tx: watch::Sender<Arc<FileConfig>>,
    interval: Duration,
}

impl<S: ConfigSource> ConfigWatcher<S> {
    pub fn new(source: S, initial: FileConfig) -> (Self, watch::Receiver<Arc<FileConfig>>) {
        let (tx, rx) = watch::channel(Arc::new(initial));
        let watcher = Self {
            source,
            last_version: None,
            tx,
            interval: CONFIG_POLL_INTERVAL,
        };
        (watcher, rx)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Remember the current version without publishing, so the initial
    /// load is not reported as a change.
    pub async fn prime(&mut self) {
        match self.source.version().await {
            Ok(version) => self.last_version = version,
            Err(e) => tracing::warn!(error = %e, "Could not read config version"),
        }
    }

    /// Check the source once. Returns true if a new config was published.
    pub async fn check_once(&mut self) -> bool {
        let version = match self.source.version().await {
            Ok(Some(version)) => version,
            Ok(None) => {
                if self.last_version.take().is_some() {
                    tracing::warn!(source = %self.source.describe(), "Config source disappeared, keeping current config");
                }
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Config check failed");
                return false;
            }
        };

        if self.last_version == Some(version) {
            return false;
        }
        self.last_version = Some(version);

        match self.source.load().await {
            Ok(config) => {
                if **self.tx.borrow() == config {
                    tracing::debug!("Config touched but unchanged");
                    return false;
                }
                self.tx.send_replace(Arc::new(config));
                tracing::info!(source = %self.source.describe(), "Config reloaded");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Config reload failed, keeping previous config");
                false
            }
        }
    }

    /// Poll until every receiver is gone.
    pub async fn run(mut self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let tx = self.tx.clone();

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }
        tracing::debug!("Config watcher stopped");
    }
}
