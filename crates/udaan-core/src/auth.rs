//! Auth flows: login, logout, auth check, password change, and the locally
//! persisted tenant and onboarding flags.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use udaan_session::{ApiRequest, CredentialPair, Notice, SessionClient};
use udaan_storage::Database;

use crate::endpoints;
use crate::Result;

pub const TENANT_KEY: &str = "@gym_udaan_tenant";
pub const ONBOARDING_KEY: &str = "@gym_udaan_onboarding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppUserRole {
    #[serde(rename = "ROLE_MEMBER")]
    Member,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub id: i64,
    pub app_user_role: Option<AppUserRole>,
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    /// Tenant (gym) the account belongs to
    pub business_details_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
    pub business_details_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
    pub app_user: AppUser,
}

impl LoginResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// `check-auth` answers with a fresh access token; the refresh token is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckAuthResponse {
    #[serde(alias = "token")]
    access_token: String,
    app_user: AppUser,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub app_user: Option<AppUser>,
    pub is_authenticated: bool,
    pub selected_tenant_id: Option<String>,
    pub has_completed_onboarding: bool,
}

pub struct AuthManager {
    client: SessionClient,
    db: Database,
    state: Arc<RwLock<AuthState>>,
}

impl AuthManager {
    pub fn new(client: SessionClient, db: Database) -> Self {
        Self {
            client,
            db,
            state: Arc::new(RwLock::new(AuthState::default())),
        }
    }

    /// Load the persisted tenant and onboarding flags.
    pub fn initialize(&self) -> Result<AuthState> {
        let selected_tenant_id = self.db.get_value(TENANT_KEY)?;
        let has_completed_onboarding = self.db.get_value(ONBOARDING_KEY)?.as_deref() == Some("true");

        {
            let mut state = self.state.write();
            state.selected_tenant_id = selected_tenant_id;
            state.has_completed_onboarding = has_completed_onboarding;
        }

        self.state()
    }

    /// Current auth state. Credentials wiped by a failed refresh count as
    /// logged out even before anyone calls [`AuthManager::check_auth`].
    pub fn state(&self) -> Result<AuthState> {
        let mut state = self.state.read().clone();
        if state.is_authenticated && self.client.tokens().access_token()?.is_none() {
            state.is_authenticated = false;
            state.app_user = None;
        }
        Ok(state)
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.client.tokens().access_token()?)
    }

    /// Log in and store the returned credential pair.
    ///
    /// Sent without a bearer token and without refresh-on-401, so bad
    /// credentials never look like an expired session.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Option<AppUserRole>> {
        let request = ApiRequest::post(endpoints::auth::LOGIN).json(credentials)?;
        let result = match self.client.send_public(request).await {
            Ok(response) => response.into_data::<LoginResponse>(),
            Err(err) => Err(err),
        };

        let login = match result {
            Ok(login) => login,
            Err(err) => {
                let message = err
                    .server_message()
                    .unwrap_or("Login failed. Please try again.")
                    .to_string();
                self.client.notify(Notice::error("Login Failed", message));
                tracing::warn!(user = %credentials.user_name, error = %err, "Login failed");
                return Err(err.into());
            }
        };

        self.client.tokens().set_tokens(&login.credentials())?;

        let role = login.app_user.app_user_role;
        self.client.notify(Notice::success(
            "Login Successful",
            format!("Welcome back, {}!", login.app_user.full_name),
        ));
        tracing::info!(
            user_id = login.app_user.id,
            business_id = login.app_user.business_details_id,
            role = ?role,
            "Logged in"
        );

        let mut state = self.state.write();
        state.app_user = Some(login.app_user);
        state.is_authenticated = true;

        Ok(role)
    }

    /// Tell the backend, then drop local credentials whatever it answered.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self
            .client
            .request(ApiRequest::post(endpoints::auth::LOGOUT))
            .await
        {
            tracing::warn!("Logout request failed: {}", e);
        }

        self.client.tokens().clear()?;
        {
            let mut state = self.state.write();
            state.app_user = None;
            state.is_authenticated = false;
        }

        self.client.notify(Notice::info(
            "Logged Out",
            "You have been logged out successfully.",
        ));
        tracing::info!("Logged out");

        Ok(())
    }

    /// Validate the stored access token with the backend.
    ///
    /// Returns whether the user is authenticated. Any failure clears the
    /// stored credentials.
    pub async fn check_auth(&self) -> Result<bool> {
        if self.client.tokens().access_token()?.is_none() {
            self.reset_session();
            return Ok(false);
        }

        let request = ApiRequest::get(endpoints::auth::CHECK_AUTH).token_query("accessToken");
        let result = match self.client.request(request).await {
            Ok(response) => response.into_data::<CheckAuthResponse>(),
            Err(err) => Err(err),
        };

        match result {
            Ok(check) => {
                self.client.tokens().set_access_token(&check.access_token)?;
                let mut state = self.state.write();
                state.app_user = Some(check.app_user);
                state.is_authenticated = true;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Auth check failed");
                self.client.tokens().clear()?;
                self.reset_session();
                Ok(false)
            }
        }
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let request = ApiRequest::post(endpoints::auth::CHANGE_PASSWORD).json(&serde_json::json!({
            "oldPassword": old_password,
            "newPassword": new_password,
        }))?;

        match self.client.request(request).await {
            Ok(response) => {
                let title = response
                    .message()
                    .unwrap_or_else(|| "Password Changed".to_string());
                self.client.notify(Notice::success(
                    title,
                    "Your password has been changed successfully.",
                ));
                Ok(())
            }
            Err(err) => {
                let message = err
                    .server_message()
                    .unwrap_or("Failed to change password.")
                    .to_string();
                self.client.notify(Notice::error("Error", message));
                Err(err.into())
            }
        }
    }

    pub fn select_tenant(&self, tenant_id: &str) -> Result<()> {
        self.db.set_value(TENANT_KEY, tenant_id)?;
        self.state.write().selected_tenant_id = Some(tenant_id.to_string());
        tracing::info!(tenant_id = %tenant_id, "Selected tenant");
        Ok(())
    }

    pub fn complete_onboarding(&self) -> Result<()> {
        self.db.set_value(ONBOARDING_KEY, "true")?;
        self.state.write().has_completed_onboarding = true;
        Ok(())
    }

    fn reset_session(&self) {
        let mut state = self.state.write();
        state.app_user = None;
        state.is_authenticated = false;
    }
}

impl Clone for AuthManager {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            db: self.db.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udaan_session::ClientConfig;

    fn manager() -> AuthManager {
        let db = Database::open_in_memory().unwrap();
        let config = ClientConfig::new("http://127.0.0.1:9/api/v1").unwrap();
        let client = SessionClient::new(config, db.clone()).unwrap();
        AuthManager::new(client, db)
    }

    #[test]
    fn test_role_decoding() {
        let member: AppUserRole = serde_json::from_str(r#""ROLE_MEMBER""#).unwrap();
        let admin: AppUserRole = serde_json::from_str(r#""ROLE_ADMIN""#).unwrap();
        let other: AppUserRole = serde_json::from_str(r#""ROLE_TRAINER""#).unwrap();

        assert_eq!(member, AppUserRole::Member);
        assert_eq!(admin, AppUserRole::Admin);
        assert_eq!(other, AppUserRole::Unknown);
    }

    #[test]
    fn test_login_response_accepts_token_field() {
        let login: LoginResponse = serde_json::from_value(serde_json::json!({
            "token": "A1",
            "refreshToken": "R1",
            "appUser": {
                "id": 9,
                "appUserRole": "ROLE_MEMBER",
                "fullName": "Asha Rai",
                "businessDetailsId": 2
            }
        }))
        .unwrap();

        assert_eq!(login.credentials(), CredentialPair::new("A1", "R1"));
        assert_eq!(login.app_user.phone, "");
    }

    #[test]
    fn test_flags_persist() {
        let manager = manager();
        manager.select_tenant("2").unwrap();
        manager.complete_onboarding().unwrap();

        let fresh = AuthManager::new(manager.client.clone(), manager.db.clone());
        let state = fresh.initialize().unwrap();

        assert_eq!(state.selected_tenant_id.as_deref(), Some("2"));
        assert!(state.has_completed_onboarding);
        assert!(!state.is_authenticated);
    }

    #[test]
    fn test_wiped_credentials_read_as_logged_out() {
        let manager = manager();
        manager.state.write().is_authenticated = true;
        assert!(!manager.state().unwrap().is_authenticated);

        manager.client.tokens().set_access_token("A1").unwrap();
        assert!(manager.state().unwrap().is_authenticated);
    }

    #[tokio::test]
    async fn test_check_auth_without_token_skips_backend() {
        let manager = manager();
        assert!(!manager.check_auth().await.unwrap());
    }
}
