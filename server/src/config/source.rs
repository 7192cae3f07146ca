use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

use super::{ConfigError, FileConfig};

/// Cheap change marker for a config source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigVersion {
    pub modified: Option<SystemTime>,
    pub len: u64,
    pub hash: u64,
}

/// Something the watcher can poll for configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn describe(&self) -> String;

    /// `None` when the source does not currently exist.
    async fn version(&self) -> Result<Option<ConfigVersion>, ConfigError>;

    async fn load(&self) -> Result<FileConfig, ConfigError>;
}

/// JSON file on disk.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn version(&self) -> Result<Option<ConfigVersion>, ConfigError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.read_error(e)),
        };
        let contents = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.read_error(e))?;

        let mut hasher = DefaultHasher::new();
        contents.hash(&mut hasher);

        Ok(Some(ConfigVersion {
            modified: metadata.modified().ok(),
            len: metadata.len(),
            hash: hasher.finish(),
        }))
    }

    async fn load(&self) -> Result<FileConfig, ConfigError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.read_error(e))?;
        FileConfig::parse(&self.path, &contents)
    }
}
