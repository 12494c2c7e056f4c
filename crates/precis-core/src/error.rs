use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid or incomplete configuration. Fatal — surfaced at startup,
    /// before the bot accepts any traffic.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
