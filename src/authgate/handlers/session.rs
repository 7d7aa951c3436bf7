use crate::authgate::{
    outcome::{AuthOutcome, AuthResponse, Operation, Status, MSG_NOT_AUTHENTICATED},
    session::Session,
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

pub const MSG_AUTHENTICATED: &str = "Authenticated.";

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionResponse {
    pub status: Status,
    pub message: String,
    pub user_id: i64,
    pub user_name: String,
}

#[utoipa::path(
    get,
    path= "/session",
    responses (
        (status = 200, description = "Current user", body = SessionResponse, content_type = "application/json"),
        (status = 401, description = "Not authenticated", body = AuthResponse),
    ),
    tag= "session"
)]
// axum handler for session
#[instrument(skip_all)]
pub async fn session(Extension(session): Extension<Session>) -> Response {
    let data = session.data().await;
    match (data.user_id, data.user_name) {
        (Some(user_id), Some(user_name)) => Json(SessionResponse {
            status: Status::Success,
            message: MSG_AUTHENTICATED.to_string(),
            user_id,
            user_name,
        })
        .into_response(),
        _ => {
            debug!("No authenticated user in session");
            (
                StatusCode::UNAUTHORIZED,
                Json(AuthResponse::error(MSG_NOT_AUTHENTICATED)),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path= "/logout",
    responses (
        (status = 200, description = "Session destroyed", body = AuthResponse, content_type = "application/json"),
        (status = 405, description = "Invalid request method", body = AuthResponse),
    ),
    tag= "session"
)]
// axum handler for logout
#[instrument(skip_all)]
pub async fn logout(Extension(session): Extension<Session>) -> AuthOutcome {
    session.destroy().await;
    AuthOutcome::LoggedOut
}

pub async fn session_method_not_allowed() -> AuthOutcome {
    AuthOutcome::MethodNotAllowed(Operation::Session)
}
