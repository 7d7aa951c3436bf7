use crate::authgate::{self, AuthConfig};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: SecretString,
    pub db_name: String,
    pub session_ttl_seconds: u64,
    pub secure_cookie: bool,
    pub login_redirect: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN cannot be built or the listener fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = build_dsn(&args)?;

    log_startup_args(&args, &dsn);

    let config = AuthConfig::new()
        .with_login_redirect(args.login_redirect)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_secure_cookie(args.secure_cookie);

    authgate::new(args.port, dsn, config).await
}

/// Assemble the Postgres DSN from its parts.
///
/// Credentials go through the `Url` setters so reserved characters are
/// percent-encoded.
pub(crate) fn build_dsn(args: &Args) -> Result<String> {
    let mut dsn = Url::parse(&format!("postgres://{}:{}", args.db_host, args.db_port))
        .with_context(|| format!("Invalid database host: {}", args.db_host))?;

    dsn.set_path(&format!("/{}", args.db_name));

    dsn.set_username(&args.db_user)
        .map_err(|()| anyhow!("Error setting username"))?;

    dsn.set_password(Some(args.db_password.expose_secret()))
        .map_err(|()| anyhow!("Error setting password"))?;

    Ok(dsn.to_string())
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_startup_args(args: &Args, dsn: &str) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(dsn)),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        ("secure_cookie", args.secure_cookie.to_string()),
        ("login_redirect", args.login_redirect.clone()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}
