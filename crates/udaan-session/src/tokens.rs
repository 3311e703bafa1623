//! Durable credential storage

use serde::{Deserialize, Serialize};

use udaan_storage::Database;

use crate::Result;

pub const ACCESS_TOKEN_KEY: &str = "@gym_udaan_access_token";
pub const REFRESH_TOKEN_KEY: &str = "@gym_udaan_refresh_token";

/// An access token together with the refresh token that can renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Reads and writes the credential pair under its two fixed keys.
pub struct TokenStore {
    db: Database,
}

impl TokenStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.db.get_value(ACCESS_TOKEN_KEY)?)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.db.get_value(REFRESH_TOKEN_KEY)?)
    }

    /// The stored pair, or `None` unless both halves are present.
    pub fn credentials(&self) -> Result<Option<CredentialPair>> {
        let access = self.access_token()?;
        let refresh = self.refresh_token()?;
        Ok(access
            .zip(refresh)
            .map(|(access_token, refresh_token)| CredentialPair {
                access_token,
                refresh_token,
            }))
    }

    pub fn set_access_token(&self, token: &str) -> Result<()> {
        Ok(self.db.set_value(ACCESS_TOKEN_KEY, token)?)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<()> {
        Ok(self.db.set_value(REFRESH_TOKEN_KEY, token)?)
    }

    /// Replace both tokens in one transaction.
    pub fn set_tokens(&self, pair: &CredentialPair) -> Result<()> {
        self.db.set_values(&[
            (ACCESS_TOKEN_KEY, pair.access_token.as_str()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.as_str()),
        ])?;
        Ok(())
    }

    /// Remove both tokens in one transaction.
    pub fn clear(&self) -> Result<()> {
        self.db.remove_values(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])?;
        tracing::debug!("Cleared stored credentials");
        Ok(())
    }

    /// Wipe every key in the store, not only the credentials.
    pub fn clear_all_data(&self) -> Result<()> {
        Ok(self.db.clear()?)
    }
}

impl Clone for TokenStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
