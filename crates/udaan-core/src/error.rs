//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] udaan_storage::StorageError),

    #[error("API error: {0}")]
    Api(#[from] udaan_session::ApiError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// The underlying API error, when the failure came from the backend.
    pub fn api_error(&self) -> Option<&udaan_session::ApiError> {
        match self {
            CoreError::Api(err) => Some(err),
            _ => None,
        }
    }
}
