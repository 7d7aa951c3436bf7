//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary executes.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{database, session};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let db_opts = database::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        db_host: db_opts.host,
        db_port: db_opts.port,
        db_user: db_opts.user,
        db_password: db_opts.password,
        db_name: db_opts.name,
        session_ttl_seconds: session_opts.ttl_seconds,
        secure_cookie: session_opts.secure_cookie,
        login_redirect: session_opts.login_redirect,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_server_action() {
        temp_env::with_vars(
            [
                ("AUTHGATE_DB_PORT", None::<&str>),
                ("AUTHGATE_LOGIN_REDIRECT", None),
                ("AUTHGATE_SESSION_TTL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec![
                    "authgate",
                    "--port",
                    "9000",
                    "--db-host",
                    "localhost",
                    "--db-user",
                    "authgate",
                    "--db-password",
                    "secret",
                    "--db-name",
                    "users",
                    "--secure-cookie",
                ]);

                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected a server action");
                };
                assert_eq!(args.port, 9000);
                assert_eq!(args.db_host, "localhost");
                assert_eq!(args.db_port, 5432);
                assert_eq!(args.db_password.expose_secret(), "secret");
                assert_eq!(args.session_ttl_seconds, 43_200);
                assert!(args.secure_cookie);
                assert_eq!(args.login_redirect, "dashboard.html");
            },
        );
    }
}
