//! Typed handler results and their JSON rendering.
//!
//! Every response body has the shape `{"status": "success"|"error",
//! "message": "...", ...}`; clients key off `status`, the HTTP code is
//! informational.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MSG_REGISTERED: &str = "Account created successfully!";
pub const MSG_LOGGED_IN: &str = "Login successful!";
pub const MSG_LOGGED_OUT: &str = "Logged out.";
pub const MSG_EMAIL_IN_USE: &str = "Email already in use.";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const MSG_INVALID_PAYLOAD: &str = "Invalid request payload.";
pub const MSG_NOT_AUTHENTICATED: &str = "Not authenticated.";
pub const MSG_UNAVAILABLE: &str = "Server connection error.";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: Status,
    pub message: String,
    /// Only present after a successful login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl AuthResponse {
    #[must_use]
    pub fn success(message: &str) -> Self {
        Self {
            status: Status::Success,
            message: message.to_string(),
            redirect: None,
        }
    }

    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            message: message.to_string(),
            redirect: None,
        }
    }
}

/// Which endpoint an infrastructure or protocol error belongs to; each has
/// its own generic wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    Session,
}

impl Operation {
    #[must_use]
    pub const fn server_error_message(self) -> &'static str {
        match self {
            Self::Register => {
                "An error occurred while processing your registration. Please try again later."
            }
            Self::Login | Self::Session => "A server error occurred. Please try again.",
        }
    }

    #[must_use]
    pub const fn method_not_allowed_message(self) -> &'static str {
        match self {
            Self::Register => "Invalid access.",
            Self::Login | Self::Session => "Invalid request method.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Registered,
    LoggedIn { redirect: String },
    LoggedOut,
    /// Client-fixable input problems, in the order they were detected.
    Validation(Vec<&'static str>),
    Conflict,
    InvalidCredentials,
    Infrastructure(Operation),
    MethodNotAllowed(Operation),
    Unavailable,
}

impl AuthOutcome {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Registered => StatusCode::CREATED,
            Self::LoggedIn { .. } | Self::LoggedOut => StatusCode::OK,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[must_use]
    pub fn body(&self) -> AuthResponse {
        match self {
            Self::Registered => AuthResponse::success(MSG_REGISTERED),
            Self::LoggedIn { redirect } => AuthResponse {
                redirect: Some(redirect.clone()),
                ..AuthResponse::success(MSG_LOGGED_IN)
            },
            Self::LoggedOut => AuthResponse::success(MSG_LOGGED_OUT),
            // Only the first problem is reported back.
            Self::Validation(messages) => {
                AuthResponse::error(messages.first().copied().unwrap_or(MSG_INVALID_PAYLOAD))
            }
            Self::Conflict => AuthResponse::error(MSG_EMAIL_IN_USE),
            Self::InvalidCredentials => AuthResponse::error(MSG_INVALID_CREDENTIALS),
            Self::Infrastructure(operation) => {
                AuthResponse::error(operation.server_error_message())
            }
            Self::MethodNotAllowed(operation) => {
                AuthResponse::error(operation.method_not_allowed_message())
            }
            Self::Unavailable => AuthResponse::error(MSG_UNAVAILABLE),
        }
    }
}

impl IntoResponse for AuthOutcome {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}
