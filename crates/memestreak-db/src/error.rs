use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store misconfigured: {0}")]
    Config(String),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("DB lock poisoned: {0}")]
    Poisoned(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<chrono::ParseError> for StoreError {
    fn from(e: chrono::ParseError) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
