//! In-memory bearer-token sessions.
//!
//! # Responsibilities
//! - Issue opaque tokens (32 random bytes, base64) bound to a user identity
//! - Validate `Authorization: Bearer <token>` values and session cookies
//! - Revoke tokens idempotently
//! - Answer role checks for handlers
//!
//! # Design Decisions
//! - Backed by a `DashMap`; safe to share across connection tasks via clone
//! - Expired entries are skipped on lookup but only removed by `revoke`,
//!   `purge_expired` or the optional sweeper
//! - No persistence: every session is lost on restart

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::auth::cookie::get_cookie;
use crate::http::request::Headers;

/// Lifetime applied by [`SessionStore::issue`] unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);
/// Longest lifetime a session can be issued with (one year).
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(MAX_SESSION_TTL_HOURS * 60 * 60);
/// [`MAX_SESSION_TTL`] in hours, the bound configuration is checked against.
pub const MAX_SESSION_TTL_HOURS: u64 = 8760;

const TOKEN_BYTES: usize = 32;
const BEARER_PREFIX: &str = "Bearer ";

/// Server-held record binding a token to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub expires_at: Instant,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// A thread-safe store of active sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store whose sessions live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Issue a token using the store's default lifetime.
    pub fn issue(&self, user_id: i64, username: &str, role: &str) -> String {
        self.issue_with_ttl(user_id, username, role, self.ttl)
    }

    /// Issue a token valid for `ttl`, capped at [`MAX_SESSION_TTL`].
    pub fn issue_with_ttl(&self, user_id: i64, username: &str, role: &str, ttl: Duration) -> String {
        let mut raw = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        let token = STANDARD.encode(raw);

        self.inner.insert(
            token.clone(),
            Session {
                user_id,
                username: username.to_string(),
                role: role.to_string(),
                expires_at: Instant::now() + ttl.min(MAX_SESSION_TTL),
            },
        );
        tracing::debug!(user_id, username, role, "Session issued");
        token
    }

    /// Resolve an `Authorization` header value to a live session.
    pub fn validate(&self, authorization: Option<&str>) -> Option<Session> {
        self.validate_token(bearer_token(authorization)?)
    }

    /// Resolve a bare token to a live session.
    pub fn validate_token(&self, token: &str) -> Option<Session> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        self.inner
            .get(token)
            .map(|entry| entry.value().clone())
            .filter(|session| !session.is_expired())
    }

    /// Resolve the session of a request: `Authorization` first, then the
    /// named cookie.
    pub fn validate_request(&self, headers: &Headers, cookie_name: &str) -> Option<Session> {
        self.validate(headers.get("authorization"))
            .or_else(|| self.validate_token(get_cookie(headers, cookie_name)?))
    }

    /// Remove the token named by an `Authorization` header value. Idempotent.
    pub fn revoke(&self, authorization: Option<&str>) {
        if let Some(token) = bearer_token(authorization) {
            self.revoke_token(token);
        }
    }

    /// Remove a bare token. Idempotent.
    pub fn revoke_token(&self, token: &str) {
        if self.inner.remove(token.trim()).is_some() {
            tracing::debug!("Session revoked");
        }
    }

    /// Whether the request's bearer session holds one of `roles`
    /// (case-insensitive).
    pub fn require_role(&self, headers: &Headers, roles: &[&str]) -> bool {
        match self.validate(headers.get("authorization")) {
            Some(session) => roles.iter().any(|r| r.eq_ignore_ascii_case(&session.role)),
            None => false,
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, session| !session.is_expired());
        before.saturating_sub(self.inner.len())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Periodically purge expired sessions until shutdown.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            tracing::info!(removed, remaining = store.len(), "Expired sessions purged");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Extract the token from a `Bearer <token>` value (prefix case-insensitive).
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let value = authorization?;
    if value.trim().is_empty() {
        return None;
    }
    let prefix = value.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}
