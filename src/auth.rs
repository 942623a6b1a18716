//! Mocked sign-in: an injected [`Authenticator`] checks credentials, and
//! [`AuthStore`] keeps the signed-in user and persists only the session
//! token, sealed with a [`TokenCipher`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::cipher::TokenCipher;
use crate::error::{AuthError, StorageError};
use crate::record::require_non_empty;
use crate::storage::RecordStorage;

/// Collection holding the persisted session token.
pub const SESSION_COLLECTION: &str = "session";

/// Key of the single session record.
const SESSION_KEY: &str = "current";

/// A signed-in console user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: String,
    pub avatar: String,
    pub email: String,
}

/// A successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Checks credentials and issues session tokens.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Sign in, or fail with [`AuthError::InvalidCredentials`].
    async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError>;
}

/// In-memory credential table. Every successful login gets a fresh random
/// token.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    accounts: HashMap<String, (String, User)>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account. Emails are matched case-insensitively.
    pub fn with_account(mut self, password: impl Into<String>, user: User) -> Self {
        self.accounts
            .insert(user.email.to_lowercase(), (password.into(), user));
        self
    }
}

#[async_trait::async_trait]
impl Authenticator for StaticAuthenticator {
    async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        match self.accounts.get(&email.trim().to_lowercase()) {
            Some((expected, user)) if expected == password => Ok(Session {
                user: user.clone(),
                token: uuid::Uuid::new_v4().to_string(),
            }),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

/// Sign-in state as seen by subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
}

/// Persisted shape of the session record. Only the sealed token survives a
/// restart; the user must sign in again to be authenticated.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    id: String,
    token: Option<String>,
}

/// Holds the signed-in user and token.
pub struct AuthStore {
    storage: Arc<dyn RecordStorage>,
    authenticator: Arc<dyn Authenticator>,
    cipher: TokenCipher,
    state: watch::Sender<AuthState>,
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token.
        f.debug_struct("AuthStore")
            .field("is_authenticated", &self.state.borrow().is_authenticated)
            .finish()
    }
}

impl AuthStore {
    pub fn new(
        storage: Arc<dyn RecordStorage>,
        authenticator: Arc<dyn Authenticator>,
        cipher: TokenCipher,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            storage,
            authenticator,
            cipher,
            state,
        }
    }

    /// Sign in and persist the issued token.
    ///
    /// # Errors
    ///
    /// * [`AuthError::Validation`] -- email or password is empty.
    /// * [`AuthError::InvalidCredentials`] -- the authenticator refused.
    /// * [`AuthError::Storage`] -- the token could not be persisted; the
    ///   user is not signed in.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let result = self.try_login(email, password).await;
        if let Err(ref e) = result {
            tracing::error!(error = %e, "login failed");
        }
        result
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        require_non_empty("email", email)?;
        require_non_empty("password", password)?;

        let session = self.authenticator.login(email, password).await?;
        self.persist_token(Some(&session.token)).await?;

        tracing::info!(user = %session.user.id, "signed in");
        self.state.send_replace(AuthState {
            user: Some(session.user.clone()),
            token: Some(session.token),
            is_authenticated: true,
        });
        Ok(session.user)
    }

    /// Sign out and clear the persisted token.
    ///
    /// The in-memory state is cleared even if the token cannot be erased
    /// from storage; that failure is still returned.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.state.send_replace(AuthState::default());
        self.persist_token(None).await?;
        tracing::info!("signed out");
        Ok(())
    }

    /// Reload the persisted token, if any.
    ///
    /// The user is unknown until the next login, so the store reports
    /// unauthenticated even when a token is restored. A token sealed under
    /// a different key is discarded with a warning.
    pub async fn restore(&self) -> Result<Option<String>, StorageError> {
        let records = self.storage.get_all(SESSION_COLLECTION).await?;
        let sealed = records
            .into_iter()
            .filter_map(|value| serde_json::from_value::<StoredSession>(value).ok())
            .find(|s| s.id == SESSION_KEY)
            .and_then(|s| s.token);

        let token = match sealed.map(|t| self.cipher.unseal(&t)) {
            Some(Ok(token)) => Some(token),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "discarding unreadable session token");
                None
            }
            None => None,
        };

        self.state.send_modify(|s| s.token = token.clone());
        Ok(token)
    }

    async fn persist_token(&self, token: Option<&str>) -> Result<(), StorageError> {
        let record = StoredSession {
            id: SESSION_KEY.to_owned(),
            token: token.map(|t| self.cipher.seal(t)).transpose()?,
        };
        let value = serde_json::to_value(&record)?;
        self.storage.put(SESSION_COLLECTION, SESSION_KEY, value).await
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    /// `Bearer <token>` for outgoing requests, or `None` without a token.
    pub fn authorization_header(&self) -> Option<String> {
        self.state
            .borrow()
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| format!("Bearer {t}"))
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Forget the in-memory session. The persisted token is kept.
    pub(crate) fn reset(&self) {
        self.state.send_replace(AuthState::default());
    }
}
