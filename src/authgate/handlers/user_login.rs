use crate::authgate::{
    config::AuthConfig,
    handlers::submission::Submission,
    outcome::{AuthOutcome, AuthResponse, Operation},
    password,
    session::Session,
    storage::{SharedUserStore, UserStore},
};
use axum::extract::Extension;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

pub const MSG_CREDENTIALS_REQUIRED: &str = "Email and password are required.";

#[derive(ToSchema)]
pub struct UserLogin {
    email: String,
    #[schema(rename = "senha")]
    password: String,
}

impl std::fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLogin")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl UserLogin {
    #[must_use]
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            email: submission.text("email").trim().to_string(),
            password: submission.text("senha").to_string(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.trim().is_empty()
    }
}

#[utoipa::path(
    post,
    path= "/user/login",
    request_body(content = UserLogin, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 200, description = "Login successful, session cookie issued", body = AuthResponse, content_type = "application/json"),
        (status = 400, description = "Email or password missing", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = AuthResponse),
        (status = 405, description = "Invalid request method", body = AuthResponse),
        (status = 500, description = "Server error", body = AuthResponse),
        (status = 503, description = "Database unavailable", body = AuthResponse),
    ),
    tag= "login"
)]
// axum handler for login
#[instrument(skip_all)]
pub async fn login(
    Extension(users): Extension<SharedUserStore>,
    Extension(config): Extension<Arc<AuthConfig>>,
    Extension(session): Extension<Session>,
    submission: Submission,
) -> AuthOutcome {
    let user = UserLogin::from_submission(&submission);

    debug!("user: {:?}", user);

    login_user(users.as_ref(), &config, &session, user).await
}

pub async fn login_method_not_allowed() -> AuthOutcome {
    AuthOutcome::MethodNotAllowed(Operation::Login)
}

/// Check the credentials and, on success, bind the user to a regenerated
/// session. Unknown email and wrong password produce the same outcome.
pub async fn login_user(
    users: &dyn UserStore,
    config: &AuthConfig,
    session: &Session,
    user: UserLogin,
) -> AuthOutcome {
    if !user.is_complete() {
        return AuthOutcome::Validation(vec![MSG_CREDENTIALS_REQUIRED]);
    }

    let record = match users.find_by_email(&user.email).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!("Login failed: unknown email");
            return AuthOutcome::InvalidCredentials;
        }
        Err(e) => {
            error!("Error looking up user: {e:#}");
            return AuthOutcome::Infrastructure(Operation::Login);
        }
    };

    let plaintext = user.password;
    let stored_hash = record.password_hash.clone();
    let verified = match tokio::task::spawn_blocking(move || {
        password::verify(&plaintext, &stored_hash)
    })
    .await
    {
        Ok(verified) => verified,
        Err(e) => {
            error!("Password verification task failed: {e}");
            return AuthOutcome::Infrastructure(Operation::Login);
        }
    };

    if !verified {
        debug!("Login failed: password mismatch");
        return AuthOutcome::InvalidCredentials;
    }

    if let Err(e) = session.authenticate(record.id, record.name).await {
        error!("Error regenerating session: {e:#}");
        return AuthOutcome::Infrastructure(Operation::Login);
    }

    info!(user_id = record.id, "User logged in");

    AuthOutcome::LoggedIn {
        redirect: config.login_redirect().to_string(),
    }
}
