use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ulid::Ulid;

use crate::error::ErrorKind;
use crate::limits::{MAX_PASSWORD_LEN, MAX_SESSIONS};

/// Decides whether a submitted secret grants membership. Injected into
/// [`SessionManager`] so the booking core never sees how credentials are checked.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, secret: &str) -> bool;
}

/// The single members password shared by the family.
#[derive(Debug)]
pub struct SharedSecret {
    password: String,
}

impl SharedSecret {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl CredentialVerifier for SharedSecret {
    async fn verify(&self, secret: &str) -> bool {
        constant_time_eq(self.password.as_bytes(), secret.as_bytes())
    }
}

/// Byte comparison whose running time does not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    /// No session on this connection, or the token is unknown.
    SessionMissing,
    SessionExpired,
    TooManySessions,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Auth
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "incorrect password"),
            AuthError::SessionMissing => write!(f, "not logged in"),
            AuthError::SessionExpired => write!(f, "session expired, log in again"),
            AuthError::TooManySessions => write!(f, "too many active sessions"),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Ulid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues and checks session tokens. A token is the only thing that opens the
/// members' calendar.
pub struct SessionManager {
    verifier: Arc<dyn CredentialVerifier>,
    sessions: DashMap<Ulid, Session>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, ttl: Duration) -> Self {
        Self {
            verifier,
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub async fn login(&self, secret: &str) -> Result<Session, AuthError> {
        self.login_at(secret, Utc::now()).await
    }

    pub async fn login_at(&self, secret: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
        if secret.len() > MAX_PASSWORD_LEN || !self.verifier.verify(secret).await {
            warn!("login rejected");
            metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
            return Err(AuthError::InvalidCredentials);
        }
        if self.sessions.len() >= MAX_SESSIONS {
            self.purge_expired(now);
            if self.sessions.len() >= MAX_SESSIONS {
                return Err(AuthError::TooManySessions);
            }
        }

        let session = Session {
            token: Ulid::new(),
            expires_at: now + self.ttl,
        };
        self.sessions.insert(session.token, session.clone());
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        info!("session {} opened", session.token);
        Ok(session)
    }

    /// Look up a live session. Expired sessions are dropped on sight.
    pub fn resume(&self, token: Ulid) -> Result<Session, AuthError> {
        self.resume_at(token, Utc::now())
    }

    pub fn resume_at(&self, token: Ulid, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let session = self
            .sessions
            .get(&token)
            .map(|e| e.value().clone())
            .ok_or(AuthError::SessionMissing)?;
        if session.is_expired(now) {
            self.sessions.remove(&token);
            return Err(AuthError::SessionExpired);
        }
        Ok(session)
    }

    pub fn logout(&self, token: Ulid) -> bool {
        let removed = self.sessions.remove(&token).is_some();
        if removed {
            info!("session {token} closed");
            metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        }
        removed
    }

    /// Drop every session expired at `now`. Returns how many were dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        let purged = before.saturating_sub(self.sessions.len());
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        purged
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
