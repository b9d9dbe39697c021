//! Session issuing and revocation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::AuthConfig;

/// Opaque session token issued at login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown user or wrong password.
    #[error("authentication failed for user {username}")]
    InvalidCredentials { username: String },

    /// The credential store could not be consulted.
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn class_name(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials { .. } => "AuthError::InvalidCredentials",
            AuthError::Unavailable(_) => "AuthError::Unavailable",
        }
    }
}

/// Failures involving an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session with this id exists.
    #[error("no session found for id {0}")]
    UnknownSession(String),

    /// The session existed but has timed out.
    #[error("session {0} has expired")]
    Expired(String),

    /// The session store failed.
    #[error("session backend error: {0}")]
    Backend(String),
}

impl SessionError {
    pub fn class_name(&self) -> &'static str {
        match self {
            SessionError::UnknownSession(_) => "SessionError::UnknownSession",
            SessionError::Expired(_) => "SessionError::Expired",
            SessionError::Backend(_) => "SessionError::Backend",
        }
    }
}

/// Authenticates agents and owns their sessions.
///
/// Called from many connection tasks at once.
pub trait SessionBackend: Send + Sync {
    /// Check credentials and issue a new session.
    fn login(&self, username: &str, password: &str) -> Result<SessionId, AuthError>;

    /// End a session.
    fn logout(&self, session_id: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Clone)]
struct SessionInfo {
    username: String,
    expires_at: Option<Instant>,
}

impl SessionInfo {
    fn is_active(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

/// Session backend with a static credential table and in-memory sessions.
#[derive(Clone)]
pub struct InMemorySessionBackend {
    credentials: Arc<HashMap<String, String>>,
    sessions: Arc<DashMap<SessionId, SessionInfo>>,
    session_timeout: Option<Duration>,
}

impl InMemorySessionBackend {
    /// Create a backend accepting the given `(username, password)` pairs.
    pub fn new<I, U, P>(credentials: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            credentials: Arc::new(
                credentials
                    .into_iter()
                    .map(|(u, p)| (u.into(), p.into()))
                    .collect(),
            ),
            sessions: Arc::new(DashMap::new()),
            session_timeout: None,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let backend = Self::new(
            config
                .users
                .iter()
                .map(|user| (user.username.clone(), user.password.clone())),
        );
        match config.session_timeout_secs {
            Some(secs) => backend.with_session_timeout(Duration::from_secs(secs)),
            None => backend,
        }
    }

    /// Expire sessions this long after login.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Resolve a session to its username, dropping it if it has expired.
    pub fn validate(&self, session_id: &str) -> Result<String, SessionError> {
        let key = SessionId::new(session_id);
        let info = self
            .sessions
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_owned()))?;

        if info.is_active(Instant::now()) {
            Ok(info.username)
        } else {
            self.sessions.remove(&key);
            Err(SessionError::Expired(session_id.to_owned()))
        }
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        if self.session_timeout.is_none() {
            return 0;
        }
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, info| info.is_active(now));
        before.saturating_sub(self.sessions.len())
    }

    /// Number of sessions currently held, including expired ones not yet purged.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl SessionBackend for InMemorySessionBackend {
    fn login(&self, username: &str, password: &str) -> Result<SessionId, AuthError> {
        match self.credentials.get(username) {
            Some(expected) if expected == password => {
                let purged = self.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Expired sessions removed");
                }
                let session_id = SessionId::new(uuid::Uuid::new_v4().to_string());
                let expires_at = self.session_timeout.map(|timeout| Instant::now() + timeout);
                self.sessions.insert(
                    session_id.clone(),
                    SessionInfo {
                        username: username.to_owned(),
                        expires_at,
                    },
                );
                tracing::debug!(username, session_id = %session_id, "Session created");
                Ok(session_id)
            }
            _ => Err(AuthError::InvalidCredentials {
                username: username.to_owned(),
            }),
        }
    }

    fn logout(&self, session_id: &str) -> Result<(), SessionError> {
        match self.sessions.remove(&SessionId::new(session_id)) {
            Some((_, info)) if info.is_active(Instant::now()) => {
                tracing::debug!(username = %info.username, session_id, "Session closed");
                Ok(())
            }
            Some(_) => Err(SessionError::Expired(session_id.to_owned())),
            None => Err(SessionError::UnknownSession(session_id.to_owned())),
        }
    }
}
