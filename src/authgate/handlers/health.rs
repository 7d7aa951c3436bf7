use crate::{authgate::storage::Database, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database is healthy", body = [Health]),
        (status = 503, description = "Database is unhealthy or was never connected", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, Extension(database): Extension<Database>) -> impl IntoResponse {
    let result = match &database {
        Database::Connected(users) => users.ping().await.map_err(|err| {
            error!("Failed to ping database: {err:#}");
        }),
        Database::Unavailable => Err(()),
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = health.commit.get(0..7).unwrap_or_default();

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .unwrap_or_else(|err| {
            error!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    if result.is_ok() {
        debug!("Database connection is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Database connection is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authgate::storage::{InsertOutcome, NewUser, UserRecord, UserStore};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::response::Response;
    use http_body_util::BodyExt;
    use std::sync::Arc;

    struct PingStore {
        healthy: bool,
    }

    #[async_trait]
    impl UserStore for PingStore {
        async fn email_exists(&self, _email: &str) -> Result<bool> {
            Ok(false)
        }

        async fn insert_user(&self, _user: &NewUser<'_>) -> Result<InsertOutcome> {
            Ok(InsertOutcome::Created(1))
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<UserRecord>> {
            Ok(None)
        }

        async fn ping(&self) -> Result<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(anyhow!("connection refused"))
            }
        }
    }

    async fn check(method: Method, database: Database) -> Response {
        health(method, Extension(database)).await.into_response()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthy_database() {
        let database = Database::Connected(Arc::new(PingStore { healthy: true }));
        let response = check(Method::GET, database).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));
        let body = body_json(response).await;
        assert_eq!(body["database"], "ok");
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn failing_ping_is_unhealthy() {
        let database = Database::Connected(Arc::new(PingStore { healthy: false }));
        let response = check(Method::GET, database).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["database"], "error");
    }

    #[tokio::test]
    async fn unavailable_database_is_unhealthy() {
        let response = check(Method::GET, Database::Unavailable).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn options_has_empty_body() {
        let database = Database::Connected(Arc::new(PingStore { healthy: true }));
        let response = check(Method::OPTIONS, database).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }
}
