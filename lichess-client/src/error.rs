//! Error types for the Lichess client

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lichess returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Server returned invalid data: {0}")]
    InvalidData(String),

    #[error("Mock response not configured for: {0}")]
    NotConfigured(String),
}

impl ClientError {
    /// True when only a single stream record was bad and the stream itself
    /// is still usable.
    pub fn is_record_error(&self) -> bool {
        matches!(self, Self::InvalidData(_))
    }
}
