use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::auth::types::Account;
use crate::credential::token_preview;
use crate::error::GatewayResult;

/// Opaque session key handed to the browser inside the signed cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the gateway keeps for a signed-in browser.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user: Account,
    pub access_token: String,
}

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("user", &self.user)
            .field("access_token", &token_preview(&self.access_token))
            .finish()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> GatewayResult<Option<SessionData>>;

    async fn set(&self, id: &SessionId, data: SessionData) -> GatewayResult<()>;

    /// Remove the session. Destroying an unknown id is not an error.
    async fn destroy(&self, id: &SessionId) -> GatewayResult<()>;
}

struct Record {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

/// In-process session store. Sessions are lost on restart.
pub struct MemoryStore {
    ttl: Duration,
    records: RwLock<HashMap<SessionId, Record>>,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop every expired record.
    pub async fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        before - records.len()
    }

    /// Run `prune_expired` every `period` until the handle is aborted.
    pub fn spawn_pruner(self: Arc<Self>, period: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let pruned = self.prune_expired().await;
                if pruned > 0 {
                    tracing::debug!("Pruned {} expired sessions", pruned);
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &SessionId) -> GatewayResult<Option<SessionData>> {
        {
            let records = self.records.read().await;
            match records.get(id) {
                None => return Ok(None),
                Some(record) if record.expires_at > Utc::now() => {
                    return Ok(Some(record.data.clone()))
                }
                Some(_) => {}
            }
        }

        // expired
        self.records.write().await.remove(id);
        Ok(None)
    }

    async fn set(&self, id: &SessionId, data: SessionData) -> GatewayResult<()> {
        let record = Record {
            data,
            expires_at: Utc::now() + self.ttl,
        };
        self.records.write().await.insert(id.clone(), record);
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> GatewayResult<()> {
        self.records.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{Account, IdTokenClaims};

    fn session_for(name: &str) -> SessionData {
        SessionData {
            user: Account {
                home_account_id: "oid-1.tenant-1".to_string(),
                username: format!("{}@contoso.com", name.to_lowercase()),
                name: Some(name.to_string()),
                tenant_id: "tenant-1".to_string(),
                id_token_claims: IdTokenClaims {
                    tid: Some("tenant-1".to_string()),
                    ..Default::default()
                },
            },
            access_token: "access-token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_set_get_destroy() {
        let store = MemoryStore::new(Duration::hours(1));
        let id = SessionId::generate();

        assert!(store.get(&id).await.unwrap().is_none());

        store.set(&id, session_for("Alice")).await.unwrap();
        let loaded = store.get(&id).await.unwrap().expect("session should exist");
        assert_eq!(loaded.user.name.as_deref(), Some("Alice"));
        assert_eq!(loaded.access_token, "access-token");

        store.destroy(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_destroy_unknown_session_is_ok() {
        let store = MemoryStore::new(Duration::hours(1));
        assert!(store.destroy(&SessionId::generate()).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_dropped() {
        let store = MemoryStore::new(Duration::seconds(-1));
        let id = SessionId::generate();
        store.set(&id, session_for("Bob")).await.unwrap();

        assert!(store.get(&id).await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let store = MemoryStore::new(Duration::seconds(-1));
        store
            .set(&SessionId::generate(), session_for("Bob"))
            .await
            .unwrap();
        store
            .set(&SessionId::generate(), session_for("Carol"))
            .await
            .unwrap();

        assert_eq!(store.prune_expired().await, 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_pruner_evicts_sessions_nobody_reads() {
        let store = Arc::new(MemoryStore::new(Duration::seconds(-1)));
        for _ in 0..100 {
            store
                .set(&SessionId::generate(), session_for("Dave"))
                .await
                .unwrap();
        }
        assert_eq!(store.len().await, 100);

        let pruner = store
            .clone()
            .spawn_pruner(std::time::Duration::from_millis(10));
        for _ in 0..50 {
            if store.is_empty().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        pruner.abort();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_pruner_keeps_live_sessions() {
        let store = Arc::new(MemoryStore::new(Duration::hours(1)));
        let id = SessionId::generate();
        store.set(&id, session_for("Erin")).await.unwrap();

        let pruner = store
            .clone()
            .spawn_pruner(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        pruner.abort();

        assert!(store.get(&id).await.unwrap().is_some());
    }

    #[test]
    fn test_debug_hides_access_token() {
        let mut session = session_for("Alice");
        session.access_token = "x".repeat(40);
        assert!(!format!("{:?}", session).contains(&"x".repeat(40)));
    }
}
