//! Session state: credentials, signed-in user, and persistence.
//!
//! `SessionStore` owns the only mutable authentication state in the process.
//! Every mutation is mirrored through the injected [`SessionStorage`] port so
//! a restart restores the signed-in session; persistence failures are logged
//! and never surface on the request path.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::ApiUser;

/// A credential pair as issued by the sign-in and refresh endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    /// Absent when the server issued no refresh token; refresh is skipped.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Everything the session knows. Empty at process start, populated on
/// sign-in, cleared on sign-out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub tokens: Option<AuthTokens>,
    #[serde(default)]
    pub user: Option<ApiUser>,
    #[serde(default)]
    pub login_at: Option<DateTime<Utc>>,
}

/// Persistence port for the session. Production injects the file-backed
/// implementation; tests inject an in-memory one.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<SessionData>>;
    fn save(&self, session: &SessionData) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

pub struct SessionStore {
    state: RwLock<SessionData>,
    storage: Box<dyn SessionStorage>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        Self {
            state: RwLock::new(SessionData::default()),
            storage,
        }
    }

    /// Create a store, restoring the persisted session if one exists.
    /// An unreadable session file degrades to a signed-out session.
    pub fn load(storage: Box<dyn SessionStorage>) -> Self {
        let state = match storage.load() {
            Ok(Some(data)) => {
                debug!(
                    has_tokens = data.tokens.is_some(),
                    has_user = data.user.is_some(),
                    "session restored"
                );
                data
            }
            Ok(None) => SessionData::default(),
            Err(err) => {
                warn!(error = %err, "failed to load persisted session, starting signed out");
                SessionData::default()
            }
        };
        Self {
            state: RwLock::new(state),
            storage,
        }
    }

    /// Full copy of the current session.
    pub async fn snapshot(&self) -> SessionData {
        self.state.read().await.clone()
    }

    pub async fn tokens(&self) -> Option<AuthTokens> {
        self.state.read().await.tokens.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .tokens
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
    }

    pub async fn user(&self) -> Option<ApiUser> {
        self.state.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.tokens.is_some()
    }

    /// Install a credential pair, stamping the sign-in time.
    pub async fn set_tokens(&self, tokens: AuthTokens) {
        let mut state = self.state.write().await;
        state.tokens = Some(tokens);
        state.login_at = Some(Utc::now());
        self.persist(&state);
    }

    pub async fn set_user(&self, user: Option<ApiUser>) {
        let mut state = self.state.write().await;
        state.user = user;
        self.persist(&state);
    }

    /// Reset to the empty session and drop the persisted copy.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = SessionData::default();
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "failed to clear persisted session");
        }
    }

    fn persist(&self, state: &SessionData) {
        if let Err(err) = self.storage.save(state) {
            warn!(error = %err, "failed to persist session");
        }
    }
}

/// File-backed session storage: pretty JSON at a fixed path.
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<SessionData>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    fn save(&self, session: &SessionData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// In-memory session storage sharing one cell across clones. Used by tests
/// and available for embedding contexts that manage persistence themselves.
#[derive(Clone, Default)]
pub struct MemorySessionStorage {
    cell: Arc<std::sync::Mutex<Option<SessionData>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<SessionData>> {
        match self.cell.lock() {
            Ok(cell) => Ok(cell.clone()),
            Err(_) => Ok(None),
        }
    }

    fn save(&self, session: &SessionData) -> Result<()> {
        if let Ok(mut cell) = self.cell.lock() {
            *cell = Some(session.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut cell) = self.cell.lock() {
            *cell = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(access: &str, refresh: Option<&str>) -> AuthTokens {
        AuthTokens {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_set_tokens_stamps_login_time() {
        let store = SessionStore::new(Box::new(MemorySessionStorage::new()));
        assert!(!store.is_authenticated().await);

        store.set_tokens(tokens("T1", Some("R1"))).await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.tokens.unwrap().access_token, "T1");
        assert!(snapshot.login_at.is_some());
        assert!(store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let store = SessionStore::new(Box::new(MemorySessionStorage::new()));
        store.set_tokens(tokens("T1", Some("R1"))).await;
        store.clear().await;

        let snapshot = store.snapshot().await;
        assert!(snapshot.tokens.is_none());
        assert!(snapshot.user.is_none());
        assert!(snapshot.login_at.is_none());
    }

    #[tokio::test]
    async fn test_mutations_reach_the_storage_port() {
        let storage = MemorySessionStorage::new();
        let store = SessionStore::new(Box::new(storage.clone()));

        store.set_tokens(tokens("T1", None)).await;
        let persisted = storage.load().unwrap().expect("session was not persisted");
        assert_eq!(persisted.tokens.unwrap().access_token, "T1");

        store.clear().await;
        assert!(storage.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_restores_persisted_session() {
        let storage = MemorySessionStorage::new();
        {
            let store = SessionStore::new(Box::new(storage.clone()));
            store.set_tokens(tokens("T1", Some("R1"))).await;
        }

        let restored = SessionStore::load(Box::new(storage));
        assert_eq!(restored.access_token().await.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("session.json");
        let storage = FileSessionStorage::new(path.clone());

        assert!(storage.load().unwrap().is_none());

        let mut session = SessionData::default();
        session.tokens = Some(tokens("T1", Some("R1")));
        storage.save(&session).unwrap();
        assert!(path.exists());

        let loaded = storage.load().unwrap().expect("session file missing");
        assert_eq!(loaded.tokens.unwrap().access_token, "T1");

        storage.clear().unwrap();
        assert!(!path.exists());
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_tokens_parse_without_refresh_token() {
        let pair: AuthTokens =
            serde_json::from_str(r#"{"access_token":"T1"}"#).expect("Failed to parse tokens");
        assert!(pair.refresh_token.is_none());
    }
}
