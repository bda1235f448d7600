//! Server-side session store and signed session cookies.
//!
//! The cookie only carries an opaque random token plus its BLAKE3 MAC; the
//! user id lives in memory on the server.  OAuth `state` values are issued
//! and consumed here as well.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "gifter_session";

/// OAuth `state` values expire after this long.
const OAUTH_STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Clone)]
struct Session {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// In-memory sessions keyed by token (hex).
#[derive(Clone)]
pub struct SessionStore {
    key: [u8; 32],
    max_age: Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    oauth_states: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl SessionStore {
    pub fn new(secret: &str, max_age: Duration) -> Self {
        Self {
            key: blake3::derive_key("gifter session cookie v1", secret.as_bytes()),
            max_age,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            oauth_states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Start a session for `user_id`; returns the cookie value.
    pub async fn create(&self, user_id: Uuid) -> String {
        let token = random_token();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.max_age).unwrap_or(chrono::Duration::days(30));

        self.sessions
            .write()
            .await
            .insert(token.clone(), Session { user_id, expires_at });

        debug!(user = %user_id, "session created");
        format!("{token}.{}", self.sign(&token))
    }

    /// Resolve a cookie value to its user, if the session is live.
    pub async fn resolve(&self, cookie_value: &str) -> Option<Uuid> {
        let token = self.verify(cookie_value)?;
        let sessions = self.sessions.read().await;
        let session = sessions.get(token)?;
        (session.expires_at > Utc::now()).then_some(session.user_id)
    }

    /// End the session behind a cookie value.
    pub async fn remove(&self, cookie_value: &str) {
        if let Some(token) = self.verify(cookie_value) {
            self.sessions.write().await.remove(token);
        }
    }

    /// Issue a single-use OAuth `state`.
    pub async fn issue_oauth_state(&self) -> String {
        let state = random_token();
        self.oauth_states.write().await.insert(
            state.clone(),
            Utc::now() + chrono::Duration::seconds(OAUTH_STATE_TTL_SECS),
        );
        state
    }

    /// Consume an OAuth `state`.  Returns `false` if unknown or expired.
    pub async fn take_oauth_state(&self, state: &str) -> bool {
        match self.oauth_states.write().await.remove(state) {
            Some(expires_at) => expires_at > Utc::now(),
            None => false,
        }
    }

    /// Drop expired sessions and OAuth states.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let purged = before - sessions.len();
        drop(sessions);

        self.oauth_states
            .write()
            .await
            .retain(|_, expires_at| *expires_at > now);

        if purged > 0 {
            debug!(purged, "expired sessions purged");
        }
    }

    fn sign(&self, token: &str) -> String {
        blake3::keyed_hash(&self.key, token.as_bytes())
            .to_hex()
            .to_string()
    }

    /// Split `<token>.<mac>` and check the MAC in constant time.
    fn verify<'a>(&self, cookie_value: &'a str) -> Option<&'a str> {
        let (token, mac) = cookie_value.split_once('.')?;
        let expected = self.sign(token);
        if mac.len() != expected.len() || mac.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1
        {
            return None;
        }
        Some(token)
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// Cookie headers
// ---------------------------------------------------------------------------

/// Cookie attributes shared by every `Set-Cookie` we emit.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub domain: String,
    pub secure: bool,
}

/// `Set-Cookie` value installing a session cookie.
pub fn session_cookie(value: &str, max_age: Duration, opts: &CookieOptions) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}; Domain={}",
        max_age.as_secs(),
        opts.domain
    );
    if opts.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value deleting the session cookie.
pub fn clear_session_cookie(opts: &CookieOptions) -> String {
    session_cookie("", Duration::ZERO, opts)
}

/// Extract the session cookie value from request headers.
pub fn session_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn store() -> SessionStore {
        SessionStore::new("test-secret", Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn create_and_resolve() {
        let store = store();
        let user = Uuid::new_v4();
        let cookie = store.create(user).await;
        assert_eq!(store.resolve(&cookie).await, Some(user));

        store.remove(&cookie).await;
        assert_eq!(store.resolve(&cookie).await, None);
    }

    #[tokio::test]
    async fn tampered_cookie_rejected() {
        let store = store();
        let cookie = store.create(Uuid::new_v4()).await;
        let (token, _) = cookie.split_once('.').unwrap();

        assert_eq!(store.resolve(token).await, None);
        assert_eq!(store.resolve(&format!("{token}.deadbeef")).await, None);

        // Same token signed under another secret.
        let other = SessionStore::new("other-secret", Duration::from_secs(3600));
        assert_eq!(
            store.resolve(&format!("{token}.{}", other.sign(token))).await,
            None
        );
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let store = SessionStore::new("test-secret", Duration::ZERO);
        let cookie = store.create(Uuid::new_v4()).await;
        assert_eq!(store.resolve(&cookie).await, None);

        store.purge_expired().await;
        assert!(store.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn oauth_state_is_single_use() {
        let store = store();
        let state = store.issue_oauth_state().await;
        assert!(store.take_oauth_state(&state).await);
        assert!(!store.take_oauth_state(&state).await);
        assert!(!store.take_oauth_state("forged").await);
    }

    #[test]
    fn cookie_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; gifter_session=abc.def; other=1"),
        );
        assert_eq!(session_cookie_value(&headers).as_deref(), Some("abc.def"));

        assert_eq!(session_cookie_value(&HeaderMap::new()), None);
    }

    #[test]
    fn set_cookie_attributes() {
        let opts = CookieOptions {
            domain: "gifter.example".into(),
            secure: true,
        };
        let cookie = session_cookie("v", Duration::from_secs(60), &opts);
        assert!(cookie.starts_with("gifter_session=v;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.contains("Domain=gifter.example"));
        assert!(cookie.ends_with("; Secure"));

        assert!(clear_session_cookie(&opts).contains("Max-Age=0"));
    }
}
