use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath, Request},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod handlers;
mod openapi;
pub mod outcome;
pub mod password;
pub mod session;
pub mod storage;

pub use config::AuthConfig;
pub use openapi::openapi;

use handlers::{
    session::session_method_not_allowed, user_login::login_method_not_allowed,
    user_register::register_method_not_allowed,
};
use outcome::AuthOutcome;
use session::SessionStore;
use storage::{Database, PgUserStore};

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, dsn: String, config: AuthConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await;

    // Keep serving without a database so clients get a JSON error instead of
    // a refused connection.
    let database = match pool {
        Ok(pool) => Database::Connected(Arc::new(PgUserStore::new(pool))),
        Err(err) => {
            error!("Failed to connect to database: {err}");
            Database::Unavailable
        }
    };

    let sessions = Arc::new(SessionStore::new(
        config.session_ttl(),
        config.secure_cookie(),
    ));

    let app = app(database, sessions, Arc::new(config));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Build the router with every route and layer wired in.
pub fn app(database: Database, sessions: Arc<SessionStore>, config: Arc<AuthConfig>) -> Router {
    // Sessions do not touch the database. The session layer wraps only the
    // method routes, so rejected methods leave the store untouched.
    let session_routes = Router::new()
        .route(
            "/session",
            get(handlers::session)
                .route_layer(middleware::from_fn(session::middleware))
                .fallback(session_method_not_allowed),
        )
        .route(
            "/logout",
            post(handlers::logout)
                .route_layer(middleware::from_fn(session::middleware))
                .fallback(session_method_not_allowed),
        );

    // The database gate runs before method matching so an unavailable
    // database is reported for any request to these paths.
    let user_routes = Router::new()
        .route(
            "/user/register",
            post(handlers::register)
                .route_layer(middleware::from_fn(session::middleware))
                .fallback(register_method_not_allowed),
        )
        .route(
            "/user/login",
            post(handlers::login)
                .route_layer(middleware::from_fn(session::middleware))
                .fallback(login_method_not_allowed),
        )
        .route_layer(middleware::from_fn(require_database));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health).options(handlers::health))
        .merge(user_routes)
        .merge(session_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(database))
                .layer(Extension(sessions))
                .layer(Extension(config)),
        )
}

/// Hand the user store to the auth handlers, or answer with a connection
/// error when the startup connection failed.
async fn require_database(
    Extension(database): Extension<Database>,
    mut request: Request,
    next: Next,
) -> Response {
    match database {
        Database::Connected(users) => {
            request.extensions_mut().insert(users);
            next.run(request).await
        }
        Database::Unavailable => {
            error!("Database unavailable, rejecting request");
            AuthOutcome::Unavailable.into_response()
        }
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
