use thiserror::Error;

pub type LampResult<T> = Result<T, LampError>;

#[derive(Error, Debug)]
pub enum LampError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Govee API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("Malformed device response: {0}")]
    Protocol(String),

    #[error("No device found with MAC {0}")]
    DeviceNotFound(String),

    #[error("Device did not answer within {0:?}")]
    Timeout(std::time::Duration),
}
