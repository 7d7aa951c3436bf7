use crate::authgate::{
    handlers::{submission::Submission, valid_email},
    outcome::{AuthOutcome, AuthResponse, Operation},
    password,
    storage::{InsertOutcome, NewUser, SharedUserStore, UserStore},
};
use axum::extract::Extension;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

pub const MSG_NAME_REQUIRED: &str = "Name is required.";
pub const MSG_INVALID_EMAIL: &str = "Invalid email format.";
pub const MSG_PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters long.";
pub const MSG_TERMS_REQUIRED: &str = "You must accept the Terms of Service and Privacy Policy.";

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(ToSchema)]
pub struct UserRegister {
    #[schema(rename = "nome")]
    name: String,
    email: String,
    #[schema(rename = "senha")]
    password: String,
    /// Present (any value) when the terms were accepted.
    #[schema(value_type = Option<String>)]
    terms: bool,
}

impl std::fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegister")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"***")
            .field("terms", &self.terms)
            .finish()
    }
}

impl UserRegister {
    #[must_use]
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            name: submission.text("nome").trim().to_string(),
            email: submission.text("email").trim().to_string(),
            password: submission.text("senha").to_string(),
            terms: submission.has("terms"),
        }
    }

    /// Every failed check, in order.
    #[must_use]
    pub fn validate(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push(MSG_NAME_REQUIRED);
        }
        if !valid_email(&self.email) {
            errors.push(MSG_INVALID_EMAIL);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(MSG_PASSWORD_TOO_SHORT);
        }
        if !self.terms {
            errors.push(MSG_TERMS_REQUIRED);
        }
        errors
    }
}

#[utoipa::path(
    post,
    path= "/user/register",
    request_body(content = UserRegister, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 201, description = "Registration successful", body = AuthResponse, content_type = "application/json"),
        (status = 400, description = "Invalid name, email, password or terms", body = AuthResponse),
        (status = 405, description = "Invalid access", body = AuthResponse),
        (status = 409, description = "Email already in use", body = AuthResponse),
        (status = 500, description = "Registration could not be stored", body = AuthResponse),
        (status = 503, description = "Database unavailable", body = AuthResponse),
    ),
    tag= "register"
)]
// axum handler for register
#[instrument(skip_all)]
pub async fn register(
    Extension(users): Extension<SharedUserStore>,
    submission: Submission,
) -> AuthOutcome {
    let user = UserRegister::from_submission(&submission);

    debug!("user: {:?}", user);

    register_user(users.as_ref(), user).await
}

pub async fn register_method_not_allowed() -> AuthOutcome {
    AuthOutcome::MethodNotAllowed(Operation::Register)
}

/// Validate, check uniqueness, hash and insert.
pub async fn register_user(users: &dyn UserStore, user: UserRegister) -> AuthOutcome {
    let errors = user.validate();
    if !errors.is_empty() {
        return AuthOutcome::Validation(errors);
    }

    // check if user exists
    match users.email_exists(&user.email).await {
        Ok(true) => {
            debug!("Email already registered");
            return AuthOutcome::Conflict;
        }
        Ok(false) => (),
        Err(e) => {
            error!("Error checking if user exists: {e:#}");
            return AuthOutcome::Infrastructure(Operation::Register);
        }
    }

    let plaintext = user.password;
    let password_hash =
        match tokio::task::spawn_blocking(move || password::hash(&plaintext)).await {
            Ok(Ok(hash)) => hash,
            Ok(Err(e)) => {
                error!("Error hashing password: {e:#}");
                return AuthOutcome::Infrastructure(Operation::Register);
            }
            Err(e) => {
                error!("Password hashing task failed: {e}");
                return AuthOutcome::Infrastructure(Operation::Register);
            }
        };

    let new_user = NewUser {
        name: &user.name,
        email: &user.email,
        password_hash: &password_hash,
    };

    match users.insert_user(&new_user).await {
        Ok(InsertOutcome::Created(user_id)) => {
            info!(user_id, "User registered");
            AuthOutcome::Registered
        }
        // Lost the race against a concurrent registration for the same email.
        Ok(InsertOutcome::Conflict) => {
            debug!("Email registered concurrently");
            AuthOutcome::Conflict
        }
        Err(e) => {
            error!("Error inserting user: {e:#}");
            AuthOutcome::Infrastructure(Operation::Register)
        }
    }
}
