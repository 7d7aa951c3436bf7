//! Runtime settings for the auth handlers and the session layer.

use std::time::Duration;

const DEFAULT_LOGIN_REDIRECT: &str = "dashboard.html";
const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    login_redirect: String,
    session_ttl_seconds: u64,
    secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_redirect: DEFAULT_LOGIN_REDIRECT.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            secure_cookie: false,
        }
    }

    #[must_use]
    pub fn with_login_redirect(mut self, redirect: String) -> Self {
        self.login_redirect = redirect;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    #[must_use]
    pub fn login_redirect(&self) -> &str {
        &self.login_redirect
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn secure_cookie(&self) -> bool {
        self.secure_cookie
    }
}
