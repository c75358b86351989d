use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode collection: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode collection: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid image payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("background save task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
