//! Credential store: the `users` table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Fields needed to check a login attempt.
#[derive(Clone)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Row to insert at registration. `password_hash` is never the plaintext.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i64),
    /// The unique index on `lower(email)` rejected the row.
    Conflict,
}

/// Email comparisons are case-insensitive; the stored value keeps the case
/// it was registered with.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn email_exists(&self, email: &str) -> Result<bool>;

    async fn insert_user(&self, user: &NewUser<'_>) -> Result<InsertOutcome>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn ping(&self) -> Result<()>;
}

pub type SharedUserStore = Arc<dyn UserStore>;

/// Database state decided once at startup.
///
/// When the initial connection fails the server keeps running and every
/// auth request is answered with a generic server error.
#[derive(Clone)]
pub enum Database {
    Connected(SharedUserStore),
    Unavailable,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected(_) => f.write_str("Database::Connected"),
            Self::Unavailable => f.write_str("Database::Unavailable"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn email_exists(&self, email: &str) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1)) AS exists";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to check if email exists")?;

        row.try_get("exists")
            .context("failed to read email existence flag")
    }

    async fn insert_user(&self, user: &NewUser<'_>) -> Result<InsertOutcome> {
        let query = "INSERT INTO users (name, email, password) VALUES ($1, $2, $3) RETURNING id";
        let result = sqlx::query(query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(row) => Ok(InsertOutcome::Created(
                row.try_get("id").context("failed to read new user id")?,
            )),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = "SELECT id, name, password FROM users WHERE lower(email) = lower($1)";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user")?;

        row.map(|row| -> Result<UserRecord> {
            Ok(UserRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                password_hash: row.try_get("password")?,
            })
        })
        .transpose()
        .context("failed to decode user row")
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;

        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }
}

/// `SQLSTATE 23505`: the row collides with a unique index.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
