use hd_api_types::UserRole;
use hd_storage::{Clock, StateStore, session_key};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

/// The authenticated identity. There is no credential verification anywhere
/// in this system; login synthesizes the identity from the supplied email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at_epoch_ms: u128,
}

/// Holds the current identity in memory and mirrors it to a fixed storage
/// key. Identity state is binary: present or absent.
pub struct SessionStore {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Identity>>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            current: RwLock::new(None),
        }
    }

    /// Reloads a previously persisted identity, if any. Called once at
    /// startup.
    pub async fn restore(&self) -> Result<Option<Identity>, SessionError> {
        let Some(raw) = self.store.get(session_key()).await? else {
            return Ok(None);
        };
        let identity: Identity = serde_json::from_slice(&raw).map_err(anyhow::Error::from)?;
        let mut guard = self.current.write().await;
        *guard = Some(identity.clone());
        Ok(Some(identity))
    }

    /// Always succeeds: the identity is synthesized from the email, with the
    /// admin role granted to any email containing "admin".
    pub async fn login(&self, email: &str, _password: &str) -> Result<Identity, SessionError> {
        let username = email.split('@').next().unwrap_or(email).to_owned();
        let role = if email.contains("admin") {
            UserRole::Admin
        } else {
            UserRole::Client
        };

        let identity = Identity {
            id: user_id_for_email(email),
            name: capitalize(&username),
            username,
            email: email.to_owned(),
            role,
            created_at_epoch_ms: self.clock.now_epoch_ms(),
        };

        self.persist(&identity).await?;
        info!(user_id = %identity.id, role = ?identity.role, "session opened");
        Ok(identity)
    }

    /// Always succeeds; registered identities are clients.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        _password: &str,
    ) -> Result<Identity, SessionError> {
        let identity = Identity {
            id: user_id_for_email(email),
            username: username.to_owned(),
            name: capitalize(username),
            email: email.to_owned(),
            role: UserRole::Client,
            created_at_epoch_ms: self.clock.now_epoch_ms(),
        };

        self.persist(&identity).await?;
        info!(user_id = %identity.id, "identity registered");
        Ok(identity)
    }

    /// Removes the persisted entry and clears the in-memory identity.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.store.remove(session_key()).await?;
        let mut guard = self.current.write().await;
        if let Some(identity) = guard.take() {
            info!(user_id = %identity.id, "session closed");
        }
        Ok(())
    }

    pub async fn current(&self) -> Option<Identity> {
        self.current.read().await.clone()
    }

    async fn persist(&self, identity: &Identity) -> Result<(), SessionError> {
        let raw = serde_json::to_vec(identity).map_err(anyhow::Error::from)?;
        self.store.put(session_key(), raw).await?;
        let mut guard = self.current.write().await;
        *guard = Some(identity.clone());
        Ok(())
    }
}

/// Stable pseudo-identity derived from the email, so the same email always
/// maps to the same per-user storage keys.
fn user_id_for_email(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    let mut id = String::with_capacity(16);
    for byte in &digest[..8] {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hd_storage::{InMemoryStore, ManualClock};

    fn session() -> (SessionStore, Arc<InMemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(InMemoryStore::default());
        let clock = Arc::new(ManualClock::default());
        clock.set(1_700_000_000_000);
        let session = SessionStore::new(store.clone(), clock.clone());
        (session, store, clock)
    }

    #[tokio::test]
    async fn login_synthesizes_identity_from_email() -> anyhow::Result<()> {
        let (session, _, _) = session();

        let identity = session.login("satoshi@example.com", "hunter2").await?;
        assert_eq!(identity.username, "satoshi");
        assert_eq!(identity.name, "Satoshi");
        assert_eq!(identity.role, UserRole::Client);
        assert_eq!(identity.created_at_epoch_ms, 1_700_000_000_000);

        let current = session.current().await.expect("identity should be set");
        assert_eq!(current, identity);
        Ok(())
    }

    #[tokio::test]
    async fn admin_email_gets_admin_role() -> anyhow::Result<()> {
        let (session, _, _) = session();
        let identity = session.login("admin@example.com", "pw").await?;
        assert_eq!(identity.role, UserRole::Admin);
        Ok(())
    }

    #[tokio::test]
    async fn same_email_yields_same_user_id() -> anyhow::Result<()> {
        let (session, _, _) = session();
        let first = session.login("miner@example.com", "pw").await?;
        session.logout().await?;
        let second = session.login("Miner@Example.com ", "other").await?;
        assert_eq!(first.id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn register_creates_client_identity() -> anyhow::Result<()> {
        let (session, _, _) = session();
        let identity = session.register("rig42", "rig42@example.com", "pw").await?;
        assert_eq!(identity.role, UserRole::Client);
        assert_eq!(identity.name, "Rig42");
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_memory_and_storage() -> anyhow::Result<()> {
        let (session, store, _) = session();
        session.login("satoshi@example.com", "pw").await?;
        assert!(store.get(session_key()).await?.is_some());

        session.logout().await?;
        assert!(session.current().await.is_none());
        assert!(store.get(session_key()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn restore_reloads_persisted_identity() -> anyhow::Result<()> {
        let (session, store, clock) = session();
        let identity = session.login("satoshi@example.com", "pw").await?;

        // A fresh store instance over the same backing storage sees it.
        let rebooted = SessionStore::new(store, clock);
        assert!(rebooted.current().await.is_none());
        let restored = rebooted.restore().await?;
        assert_eq!(restored, Some(identity));
        Ok(())
    }
}
