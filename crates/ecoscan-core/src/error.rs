//! Core error type.

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A settings file or environment override could not be applied.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid scan: {0}")]
    InvalidScan(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
