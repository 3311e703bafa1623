//! Udaan Core
//!
//! Coordination layer for the gym client: configuration, the authenticated
//! session and the auth flows built on top of it.

mod app;
mod auth;
mod config;
pub mod endpoints;
mod error;

pub use app::Udaan;
pub use auth::{
    AppUser, AppUserRole, AuthManager, AuthState, LoginRequest, LoginResponse, ONBOARDING_KEY,
    TENANT_KEY,
};
pub use config::Config;
pub use error::CoreError;

// Re-export session components
pub use udaan_session::{
    ApiEnvelope, ApiError, ApiRequest, ApiResponse, ClientConfig, CredentialPair, FormPart,
    Notice, NoticeLevel, RefreshFailure, RequestBody, RequestOptions, SessionClient,
    SessionEvent, TokenStore,
};
pub use udaan_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
