//! User-facing notices and session events

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A toast-style message for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, message)
    }

    pub fn session_expired() -> Self {
        Self::error("Session Expired", "Please login again.")
    }

    /// The notice shown for a failed request, if its class has one.
    ///
    /// Unauthorized, decode and local errors are silent here; callers decide
    /// how to present them.
    pub fn for_error(err: &ApiError) -> Option<Self> {
        match err {
            ApiError::Forbidden { .. } => Some(Self::error(
                "Permission Denied",
                "You do not have permission to perform this action.",
            )),
            ApiError::NotFound { message } => Some(Self::error(
                "Not Found",
                message
                    .as_deref()
                    .unwrap_or("The requested resource was not found."),
            )),
            ApiError::Server { .. } => Some(Self::error("Server Error", "Please try again later.")),
            ApiError::Network(_) => Some(Self::error(
                "Network Error",
                "Please check your internet connection.",
            )),
            ApiError::Timeout => Some(Self::error(
                "Request Timeout",
                "The server took too long to respond.",
            )),
            _ => None,
        }
    }
}

/// Signals from the session layer to whatever renders the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Notice(Notice),
    /// Credentials are gone; the UI should return to the login screen
    RedirectToLogin,
}
