use thiserror::Error;

#[derive(Debug, Error)]
pub enum MedciteError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive transfer error: {0}")]
    Transfer(String),

    #[error("Checksum mismatch for {file}: expected {expected}, calculated {calculated}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        calculated: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MedciteError>;
