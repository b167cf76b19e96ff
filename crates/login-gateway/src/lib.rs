//! Login gateway: signs users in through the Microsoft identity platform and
//! gates a profile page on an active subscription for their tenant.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod credential;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod session;
pub mod templates;

use auth::{IdentityProvider, MicrosoftIdentity};
use config::GatewayConfig;
use credential::CredentialProvider;
use db::SqlConnector;
use repository::{SqlSubscriptionRepository, SubscriptionRepository};
use session::{MemoryStore, SessionCookie, SessionStore};
use templates::Templates;

pub use routes::build_router;

/// How often the in-memory session store drops expired records.
const SESSION_PRUNE_PERIOD: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub identity: Arc<dyn IdentityProvider>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub session_cookie: SessionCookie,
    pub templates: Templates,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        identity: Arc<dyn IdentityProvider>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            session_cookie: SessionCookie::from_config(&config),
            templates: Templates::new(config.views_dir.clone()),
            config: Arc::new(config),
            identity,
            subscriptions,
            sessions,
        }
    }

    /// Production wiring: Microsoft identity platform, Azure SQL and the
    /// in-memory session store. Must be called inside a tokio runtime, since
    /// it starts the session pruner.
    pub fn from_config(config: GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("login-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let identity = MicrosoftIdentity::from_config(&config, http.clone());
        let credentials = CredentialProvider::new(
            config.is_local,
            http,
            config.managed_identity_client_id.clone(),
        );
        let subscriptions = SqlSubscriptionRepository::new(SqlConnector::new(&config, credentials));
        let sessions = Arc::new(MemoryStore::new(config.session_ttl()));
        sessions.clone().spawn_pruner(SESSION_PRUNE_PERIOD);

        Ok(Self::new(
            config,
            Arc::new(identity),
            Arc::new(subscriptions),
            sessions,
        ))
    }
}
