/// Domain-specific error types for the offline messaging core.
#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    #[error("DHT operation failed: {0}")]
    Dht(String),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for InboxError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Convenience type alias.
pub type InboxResult<T> = Result<T, InboxError>;
