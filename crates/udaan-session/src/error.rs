//! Session error types

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {}", .message.as_deref().unwrap_or("access token rejected"))]
    Unauthorized { message: Option<String> },

    #[error("Forbidden: {}", .message.as_deref().unwrap_or("permission denied"))]
    Forbidden { message: Option<String> },

    #[error("Not found: {}", .message.as_deref().unwrap_or("resource not found"))]
    NotFound { message: Option<String> },

    #[error("Server error (HTTP {status}): {}", .message.as_deref().unwrap_or("no details"))]
    Server {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Request failed (HTTP {status}): {}", .message.as_deref().unwrap_or("no details"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Session expired: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(#[from] udaan_storage::StorageError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Classify a non-success transport status.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
            StatusCode::FORBIDDEN => ApiError::Forbidden { message },
            StatusCode::NOT_FOUND => ApiError::NotFound { message },
            s if s.is_server_error() => ApiError::Server { status, message },
            _ => ApiError::Status { status, message },
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Forbidden { .. } => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            ApiError::Server { status, .. } | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// The `message` field of the server's error envelope, if one was sent.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Forbidden { message }
            | ApiError::NotFound { message }
            | ApiError::Server { message, .. }
            | ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Why a token refresh did not produce a new credential pair.
///
/// Cloned to every request that was waiting on the refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Refresh token rejected (HTTP {status})")]
    Rejected { status: u16, message: Option<String> },

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Could not persist refreshed tokens: {0}")]
    Storage(String),

    #[error("Refresh aborted before completion")]
    Aborted,
}
