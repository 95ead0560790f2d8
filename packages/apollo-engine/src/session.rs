use crate::api::AuthBackend;
use crate::domain::types::{Credentials, Registration, Session, User};
use crate::error::{ApiError, AuthError};
use crate::validation::{Field, ValidationErrors, validate_credentials, validate_registration};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

pub const TOKEN_KEY: &str = "apollo_token";
pub const USER_KEY: &str = "apollo_user";
pub const SESSION_FILE: &str = "session.json";

/// Durable string key-value storage for the session.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Keeps every key in a single JSON object at `<data_dir>/session.json`.
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => Ok(map),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_all(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Current user and token, mirrored to the key-value store.
pub struct SessionStore<A: AuthBackend, S: KeyValueStore> {
    auth: A,
    store: S,
    current: Mutex<Option<Session>>,
}

impl<A: AuthBackend, S: KeyValueStore> SessionStore<A, S> {
    pub fn new(auth: A, store: S) -> Self {
        Self {
            auth,
            store,
            current: Mutex::new(None),
        }
    }

    /// Verifies the persisted token. Any verification failure clears both keys.
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        let Some(token) = self.store.get(TOKEN_KEY).await? else {
            return Ok(None);
        };

        match self.auth.verify(&token).await {
            Ok(user) => {
                self.persist(&Session {
                    user: user.clone(),
                    token,
                })
                .await?;
                info!(email = %user.email, "Session restored");
                Ok(Some(user))
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected, clearing it");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        validate_credentials(credentials)?;
        let session = self.auth.login(credentials).await?;
        self.persist(&session).await?;
        info!(email = %session.user.email, "Logged in");
        Ok(session)
    }

    /// Creates the account without logging in; returns the backend's message.
    pub async fn register(&self, registration: &Registration) -> Result<Option<String>, AuthError> {
        validate_registration(registration)?;
        self.auth
            .register(registration)
            .await
            .map_err(rejected_registration)
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.clear().await?;
        info!("Logged out");
        Ok(())
    }

    fn current(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn token(&self) -> Option<String> {
        self.current().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.current().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user).context("Failed to serialize user")?;
        self.store.set(TOKEN_KEY, &session.token).await?;
        self.store.set(USER_KEY, &user).await?;
        *self.current() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.current() = None;
        self.store.remove(TOKEN_KEY).await?;
        self.store.remove(USER_KEY).await
    }
}

/// A 400 whose messages name registration fields is reported per field.
fn rejected_registration(error: ApiError) -> AuthError {
    if let ApiError::Backend { status: 400, message } = &error {
        let errors = ValidationErrors::from_backend_message(message);
        if errors.iter().any(|(field, _)| field != Field::General) {
            return AuthError::Validation(errors);
        }
    }
    AuthError::Api(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mocks::{BackendCall, InMemoryBackend};
    use tempfile::tempdir;

    fn ana() -> Registration {
        Registration {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "Str0ng!pass".to_string(),
            company: Some("ACME".to_string()),
        }
    }

    fn ana_login() -> Credentials {
        Credentials {
            email: "ana@example.com".to_string(),
            password: "Str0ng!pass".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_does_not_log_in() {
        let backend = InMemoryBackend::new();
        let sessions = SessionStore::new(backend.clone(), MemoryKeyValueStore::new());

        let message = sessions.register(&ana()).await.unwrap();
        assert!(message.is_some());
        assert!(!sessions.is_authenticated());
        assert_eq!(backend.calls(BackendCall::Login), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_backend() {
        let backend = InMemoryBackend::new();
        let sessions = SessionStore::new(backend.clone(), MemoryKeyValueStore::new());

        let weak = Registration {
            password: "password".to_string(),
            ..ana()
        };
        match sessions.register(&weak).await {
            Err(AuthError::Validation(errors)) => assert!(errors.contains(Field::Password)),
            other => panic!("expected validation error, got {:?}", other),
        }

        let blank = Credentials {
            email: String::new(),
            password: String::new(),
        };
        assert!(matches!(
            sessions.login(&blank).await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_rule_list_maps_to_fields() {
        let backend = InMemoryBackend::new();
        backend.fail_next(
            BackendCall::Register,
            ApiError::Backend {
                status: 400,
                message: "Campo 'name' é obrigatório; Formato de email inválido".to_string(),
            },
        );
        let sessions = SessionStore::new(backend.clone(), MemoryKeyValueStore::new());

        match sessions.register(&ana()).await {
            Err(AuthError::Validation(errors)) => {
                assert!(errors.contains(Field::Name));
                assert!(errors.contains(Field::Email));
            }
            other => panic!("expected field errors, got {:?}", other),
        }

        // Conflicts stay backend errors.
        sessions.register(&ana()).await.unwrap();
        assert!(matches!(
            sessions.register(&ana()).await,
            Err(AuthError::Api(ApiError::Backend { status: 409, .. }))
        ));
    }

    #[tokio::test]
    async fn test_login_persists_and_restores_from_disk() {
        let tmp = tempdir().unwrap();
        let backend = InMemoryBackend::new();

        let sessions = SessionStore::new(backend.clone(), FileKeyValueStore::new(tmp.path()));
        sessions.register(&ana()).await.unwrap();
        let session = sessions.login(&ana_login()).await.unwrap();
        assert_eq!(sessions.token().as_deref(), Some(session.token.as_str()));

        let raw = tokio::fs::read_to_string(tmp.path().join(SESSION_FILE))
            .await
            .unwrap();
        assert!(raw.contains(TOKEN_KEY));
        assert!(raw.contains(USER_KEY));

        // A fresh process reads the same file.
        let reopened = SessionStore::new(backend.clone(), FileKeyValueStore::new(tmp.path()));
        let user = reopened.restore().await.unwrap().unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(reopened.is_authenticated());
    }

    #[tokio::test]
    async fn test_rejected_token_clears_both_keys() {
        let store = MemoryKeyValueStore::new();
        store.set(TOKEN_KEY, "expired").await.unwrap();
        store.set(USER_KEY, "{}").await.unwrap();

        let sessions = SessionStore::new(InMemoryBackend::new(), store);
        assert!(sessions.restore().await.unwrap().is_none());
        assert!(sessions.store.get(TOKEN_KEY).await.unwrap().is_none());
        assert!(sessions.store.get(USER_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_restore_also_clears() {
        let backend = InMemoryBackend::new();
        backend.fail_next(BackendCall::Verify, ApiError::Network("down".to_string()));
        let store = MemoryKeyValueStore::new();
        store.set(TOKEN_KEY, "abc").await.unwrap();

        let sessions = SessionStore::new(backend, store);
        assert!(sessions.restore().await.unwrap().is_none());
        assert!(sessions.token().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let tmp = tempdir().unwrap();
        let backend = InMemoryBackend::new();
        let sessions = SessionStore::new(backend, FileKeyValueStore::new(tmp.path()));
        sessions.register(&ana()).await.unwrap();
        sessions.login(&ana_login()).await.unwrap();

        sessions.logout().await.unwrap();
        assert!(sessions.user().is_none());

        let store = FileKeyValueStore::new(tmp.path());
        assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_session_file_reads_as_empty() {
        let tmp = tempdir().unwrap();
        tokio::fs::write(tmp.path().join(SESSION_FILE), "not json")
            .await
            .unwrap();
        let store = FileKeyValueStore::new(tmp.path());
        assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
    }
}
