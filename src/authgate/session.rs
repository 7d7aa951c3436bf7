//! Server-side sessions keyed by an opaque cookie identifier.
//!
//! The raw identifier only ever lives in the client cookie; the store is keyed
//! by its SHA-256 hash. Identifiers are regenerated on login so a session id
//! planted before authentication is worthless afterwards.

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Extension, Request},
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::outcome::{AuthOutcome, Operation};

pub const SESSION_COOKIE_NAME: &str = "authgate_session";

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Values stored for an authenticated client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
}

impl SessionData {
    #[must_use]
    pub fn authenticated(user_id: i64, user_name: String) -> Self {
        Self {
            user_id: Some(user_id),
            user_name: Some(user_name),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

struct Entry {
    data: SessionData,
    last_seen: Instant,
}

struct Entries {
    sessions: HashMap<Vec<u8>, Entry>,
    next_sweep: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    secure_cookie: bool,
    sweep_interval: Duration,
    entries: Mutex<Entries>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .field("secure_cookie", &self.secure_cookie)
            .field("sweep_interval", &self.sweep_interval)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration, secure_cookie: bool) -> Self {
        Self {
            ttl,
            secure_cookie,
            sweep_interval: SWEEP_INTERVAL,
            entries: Mutex::new(Entries {
                sessions: HashMap::new(),
                next_sweep: Instant::now() + SWEEP_INTERVAL,
            }),
        }
    }

    /// How often `create` purges expired sessions.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self.entries.get_mut().next_sweep = Instant::now() + interval;
        self
    }

    /// Fetch a live session and refresh its idle timer. Expired entries are
    /// dropped on access.
    pub async fn load(&self, token: &str) -> Option<SessionData> {
        let key = hash_session_token(token);
        let mut entries = self.entries.lock().await;
        match entries.sessions.get_mut(&key) {
            Some(entry) if entry.last_seen.elapsed() < self.ttl => {
                entry.last_seen = Instant::now();
                Some(entry.data.clone())
            }
            Some(_) => {
                entries.sessions.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Start an empty session and return its identifier. Expired sessions
    /// are purged at most once per sweep interval.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails.
    pub async fn create(&self) -> Result<String> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if now >= entries.next_sweep {
            let ttl = self.ttl;
            let before = entries.sessions.len();
            entries
                .sessions
                .retain(|_, entry| entry.last_seen.elapsed() < ttl);
            entries.next_sweep = now + self.sweep_interval;
            debug!(
                purged = before - entries.sessions.len(),
                "Swept expired sessions"
            );
        }
        insert_fresh(&mut entries.sessions, SessionData::default())
    }

    /// Replace the data stored under an existing identifier.
    pub async fn save(&self, token: &str, data: SessionData) {
        let mut entries = self.entries.lock().await;
        entries.sessions.insert(
            hash_session_token(token),
            Entry {
                data,
                last_seen: Instant::now(),
            },
        );
    }

    /// Discard `token` and store `data` under a brand-new identifier.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails; the old entry is kept in that case.
    pub async fn regenerate(&self, token: &str, data: SessionData) -> Result<String> {
        let mut entries = self.entries.lock().await;
        let fresh = insert_fresh(&mut entries.sessions, data)?;
        entries.sessions.remove(&hash_session_token(token));
        Ok(fresh)
    }

    pub async fn destroy(&self, token: &str) {
        self.entries
            .lock()
            .await
            .sessions
            .remove(&hash_session_token(token));
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.sessions.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.entries.lock().await.sessions.is_empty()
    }

    fn cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.as_secs()
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

fn insert_fresh(entries: &mut HashMap<Vec<u8>, Entry>, data: SessionData) -> Result<String> {
    for _ in 0..3 {
        let token = generate_session_token()?;
        let key = hash_session_token(&token);
        if entries.contains_key(&key) {
            continue;
        }
        entries.insert(
            key,
            Entry {
                data,
                last_seen: Instant::now(),
            },
        );
        return Ok(token);
    }
    Err(anyhow!("failed to generate unique session token"))
}

/// 32 random bytes, base64url without padding.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CookieUpdate {
    Keep,
    Issue,
    Clear,
}

struct SessionState {
    token: String,
    data: SessionData,
    cookie: CookieUpdate,
}

/// Per-request handle to the caller's session.
///
/// Inserted into request extensions by [`middleware`]; handlers take it as
/// `Extension<Session>`.
#[derive(Clone)]
pub struct Session {
    store: Arc<SessionStore>,
    state: Arc<Mutex<SessionState>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Resume the session named by `presented`, or start an empty one when
    /// the cookie is missing, unknown or expired.
    ///
    /// # Errors
    /// Returns an error if a new identifier cannot be generated.
    pub async fn resume(store: Arc<SessionStore>, presented: Option<String>) -> Result<Self> {
        let existing = match presented {
            Some(token) => store.load(&token).await.map(|data| (token, data)),
            None => None,
        };

        let state = match existing {
            Some((token, data)) => SessionState {
                token,
                data,
                cookie: CookieUpdate::Keep,
            },
            None => SessionState {
                token: store.create().await?,
                data: SessionData::default(),
                cookie: CookieUpdate::Issue,
            },
        };

        Ok(Self {
            store,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub async fn id(&self) -> String {
        self.state.lock().await.token.clone()
    }

    pub async fn data(&self) -> SessionData {
        self.state.lock().await.data.clone()
    }

    /// Mark the session as logged in under a fresh identifier.
    ///
    /// # Errors
    /// Returns an error if a new identifier cannot be generated.
    pub async fn authenticate(&self, user_id: i64, user_name: String) -> Result<()> {
        let mut state = self.state.lock().await;
        let data = SessionData::authenticated(user_id, user_name);
        let token = self.store.regenerate(&state.token, data.clone()).await?;
        state.token = token;
        state.data = data;
        state.cookie = CookieUpdate::Issue;
        Ok(())
    }

    pub async fn destroy(&self) {
        let mut state = self.state.lock().await;
        self.store.destroy(&state.token).await;
        state.data = SessionData::default();
        state.cookie = CookieUpdate::Clear;
    }

    async fn set_cookie(&self) -> Option<Result<HeaderValue, InvalidHeaderValue>> {
        let state = self.state.lock().await;
        match state.cookie {
            CookieUpdate::Keep => None,
            CookieUpdate::Issue => Some(self.store.cookie(&state.token)),
            CookieUpdate::Clear => Some(self.store.clear_cookie()),
        }
    }
}

/// Attach a [`Session`] to the request and emit `Set-Cookie` when the
/// identifier was created, regenerated or destroyed.
pub async fn middleware(
    Extension(store): Extension<Arc<SessionStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = extract_session_token(request.headers());

    let session = match Session::resume(store, presented).await {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to start session: {err:#}");
            return AuthOutcome::Infrastructure(Operation::Session).into_response();
        }
    };

    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    match session.set_cookie().await {
        Some(Ok(cookie)) => {
            debug!("Issuing session cookie");
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Some(Err(err)) => error!("Failed to build session cookie: {err}"),
        None => {}
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(Duration::from_secs(60), false))
    }

    #[test]
    fn session_token_is_32_random_bytes() {
        let token = generate_session_token().unwrap();
        let decoded = Base64UrlUnpadded::decode_vec(&token).unwrap();
        assert_eq!(decoded.len(), 32);
        assert_ne!(token, generate_session_token().unwrap());
    }

    #[test]
    fn hash_session_token_stable() {
        assert_eq!(hash_session_token("token"), hash_session_token("token"));
        assert_ne!(hash_session_token("token"), hash_session_token("other"));
    }

    #[test]
    fn extract_session_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; authgate_session=abc123; lang=pt"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_session_token_ignores_other_and_empty_cookies() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; authgate_session="));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[tokio::test]
    async fn store_keys_by_hash_not_raw_token() {
        let store = store();
        let token = store.create().await.unwrap();
        let entries = store.entries.lock().await;
        assert!(entries.sessions.contains_key(&hash_session_token(&token)));
        assert!(!entries.sessions.contains_key(token.as_bytes()));
    }

    #[tokio::test]
    async fn create_starts_empty_session() {
        let store = store();
        let token = store.create().await.unwrap();
        assert_eq!(store.load(&token).await, Some(SessionData::default()));
    }

    #[tokio::test]
    async fn regenerate_discards_old_identifier() {
        let store = store();
        let old = store.create().await.unwrap();
        let data = SessionData::authenticated(7, "Ana".to_string());

        let new = store.regenerate(&old, data.clone()).await.unwrap();

        assert_ne!(old, new);
        assert_eq!(store.load(&old).await, None);
        assert_eq!(store.load(&new).await, Some(data));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let store = Arc::new(SessionStore::new(Duration::ZERO, false));
        let token = store.create().await.unwrap();
        assert_eq!(store.load(&token).await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn create_leaves_expired_sessions_until_next_sweep() {
        let store = SessionStore::new(Duration::ZERO, false)
            .with_sweep_interval(Duration::from_secs(3600));
        store.create().await.unwrap();
        store.create().await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn create_purges_expired_sessions_once_sweep_is_due() {
        let store =
            SessionStore::new(Duration::ZERO, false).with_sweep_interval(Duration::ZERO);
        store.create().await.unwrap();
        store.create().await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sweep_keeps_live_sessions() {
        let store = SessionStore::new(Duration::from_secs(60), false)
            .with_sweep_interval(Duration::ZERO);
        let first = store.create().await.unwrap();
        store.create().await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.load(&first).await, Some(SessionData::default()));
    }

    #[tokio::test]
    async fn resume_unknown_token_starts_new_session() {
        let store = store();
        let session = Session::resume(store.clone(), Some("forged".to_string()))
            .await
            .unwrap();
        assert_ne!(session.id().await, "forged");
        assert_eq!(session.set_cookie().await.map(|c| c.is_ok()), Some(true));
    }

    #[tokio::test]
    async fn resume_known_token_keeps_cookie() {
        let store = store();
        let token = store.create().await.unwrap();
        let session = Session::resume(store.clone(), Some(token.clone()))
            .await
            .unwrap();
        assert_eq!(session.id().await, token);
        assert!(session.set_cookie().await.is_none());
    }

    #[tokio::test]
    async fn authenticate_regenerates_identifier() {
        let store = store();
        let token = store.create().await.unwrap();
        let session = Session::resume(store.clone(), Some(token.clone()))
            .await
            .unwrap();

        session.authenticate(42, "Ana".to_string()).await.unwrap();

        let new_token = session.id().await;
        assert_ne!(new_token, token);
        assert_eq!(store.load(&token).await, None);
        assert_eq!(
            store.load(&new_token).await,
            Some(SessionData::authenticated(42, "Ana".to_string()))
        );

        let cookie = session.set_cookie().await.unwrap().unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE_NAME}={new_token};")));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn destroy_clears_cookie() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(60), true));
        let session = Session::resume(store.clone(), None).await.unwrap();
        session.destroy().await;

        assert!(store.is_empty().await);
        let cookie = session.set_cookie().await.unwrap().unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.ends_with("; Secure"));
    }
}
