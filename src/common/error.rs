use tch::TchError;
use thiserror::Error;

/// Errors surfaced by the translation models, datasets and resource
/// management. Failures are propagated unmodified to the caller; no local
/// recovery is attempted inside the library.
#[derive(Error, Debug)]
pub enum RustMmtError {
    #[error("Endpoint not available error: {0}")]
    FileDownloadError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Value error: {0}")]
    ValueError(String),
}

impl From<std::io::Error> for RustMmtError {
    fn from(error: std::io::Error) -> Self {
        RustMmtError::IOError(error.to_string())
    }
}

impl From<TchError> for RustMmtError {
    fn from(error: TchError) -> Self {
        RustMmtError::TchError(error.to_string())
    }
}

impl From<cached_path::Error> for RustMmtError {
    fn from(error: cached_path::Error) -> Self {
        RustMmtError::FileDownloadError(error.to_string())
    }
}

impl From<serde_json::Error> for RustMmtError {
    fn from(error: serde_json::Error) -> Self {
        RustMmtError::InvalidConfigurationError(error.to_string())
    }
}
