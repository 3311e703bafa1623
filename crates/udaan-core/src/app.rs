//! Top-level client container
//!
//! Owns the database, the session client and the auth manager. Construct one
//! per process and hand out clones of its parts.

use tokio::sync::broadcast;

use udaan_session::{SessionClient, SessionEvent};
use udaan_storage::Database;

use crate::auth::{AuthManager, AuthState};
use crate::config::Config;
use crate::Result;

pub struct Udaan {
    /// Configuration
    config: Config,
    /// Database shared by the token store and the auth flags
    db: Database,
    /// Authenticated HTTP session
    client: SessionClient,
    /// Login, logout and auth checks
    auth: AuthManager,
}

impl Udaan {
    /// Open (or create) the on-disk database and build the client.
    pub fn new(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        Self::with_database(config, db)
    }

    /// Build the client over an already opened database.
    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let client = SessionClient::new(config.client_config()?, db.clone())?;
        let auth = AuthManager::new(client.clone(), db.clone());

        tracing::info!(
            api_base_url = %client.config().base_url,
            database = %config.database_path.display(),
            "Created Udaan client"
        );

        Ok(Self {
            config,
            db,
            client,
            auth,
        })
    }

    /// Restore persisted flags.
    pub fn initialize(&self) -> Result<AuthState> {
        let state = self.auth.initialize()?;

        tracing::info!(
            has_token = self.client.tokens().access_token()?.is_some(),
            tenant = ?state.selected_tenant_id,
            onboarded = state.has_completed_onboarding,
            "Initialized client state"
        );

        Ok(state)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Notices and redirect requests for the UI layer.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.client.subscribe()
    }
}
