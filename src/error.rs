//! Error handling for camwatch

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Stream unreachable or unrecognized at connect time
    #[error("Connect error: {0}")]
    Connect(String),

    /// Transient frame acquisition failure
    #[error("Read error: {0}")]
    Read(String),

    /// Recording writer failure
    #[error("Write error: {0}")]
    Write(String),

    /// Alert/clip delivery failure (logged, never surfaced to callers)
    #[error("Alert delivery error: {0}")]
    AlertDelivery(String),

    /// Stream probe failure
    #[error("Probe error: {0}")]
    Probe(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLx database error
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
