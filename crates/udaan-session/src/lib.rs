//! Udaan Session Client
//!
//! Authenticated HTTP layer for the gym backend:
//! - Every request carries the stored bearer token
//! - A 401 triggers at most one concurrent token refresh
//! - Requests that hit 401 during a refresh wait for it and are replayed once
//! - A failed refresh clears the stored credentials and asks the UI to log in again

mod client;
mod config;
mod envelope;
mod error;
mod notice;
mod refresh;
mod request;
mod tokens;

pub use client::SessionClient;
pub use config::ClientConfig;
pub use envelope::{ApiEnvelope, ApiResponse};
pub use error::{ApiError, RefreshFailure};
pub use notice::{Notice, NoticeLevel, SessionEvent};
pub use request::{ApiRequest, FormPart, RequestBody, RequestOptions};
pub use tokens::{CredentialPair, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

pub use reqwest::{Method, StatusCode};

pub type Result<T> = std::result::Result<T, ApiError>;
