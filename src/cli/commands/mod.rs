pub mod database;
pub mod logging;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("authgate")
        .about("Session-based registration and login")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("AUTHGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = database::with_args(command);
    let command = session::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{ARG_DB_HOST, ARG_DB_NAME, ARG_DB_PASSWORD, ARG_DB_PORT, ARG_DB_USER};

    const DB_ENV: [(&str, Option<&str>); 4] = [
        ("AUTHGATE_DB_HOST", Some("db.internal")),
        ("AUTHGATE_DB_USER", Some("authgate")),
        ("AUTHGATE_DB_PASSWORD", Some("secret")),
        ("AUTHGATE_DB_NAME", Some("authgate")),
    ];

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "authgate");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Session-based registration and login".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_port_and_database() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "authgate",
            "--port",
            "8081",
            "--db-host",
            "localhost",
            "--db-port",
            "5433",
            "--db-user",
            "user",
            "--db-password",
            "password",
            "--db-name",
            "users",
        ]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(8081));
        assert_eq!(
            matches.get_one::<String>(ARG_DB_HOST).cloned(),
            Some("localhost".to_string())
        );
        assert_eq!(matches.get_one::<u16>(ARG_DB_PORT).copied(), Some(5433));
        assert_eq!(
            matches.get_one::<String>(ARG_DB_USER).cloned(),
            Some("user".to_string())
        );
        assert_eq!(
            matches.get_one::<String>(ARG_DB_PASSWORD).cloned(),
            Some("password".to_string())
        );
        assert_eq!(
            matches.get_one::<String>(ARG_DB_NAME).cloned(),
            Some("users".to_string())
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                DB_ENV[0],
                DB_ENV[1],
                DB_ENV[2],
                DB_ENV[3],
                ("AUTHGATE_PORT", Some("443")),
                ("AUTHGATE_DB_PORT", Some("6432")),
                ("AUTHGATE_SESSION_TTL", Some("600")),
                ("AUTHGATE_LOGIN_REDIRECT", Some("/home")),
                ("AUTHGATE_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["authgate"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(ARG_DB_HOST).cloned(),
                    Some("db.internal".to_string())
                );
                assert_eq!(matches.get_one::<u16>(ARG_DB_PORT).copied(), Some(6432));
                assert_eq!(
                    matches.get_one::<u64>(session::ARG_SESSION_TTL).copied(),
                    Some(600)
                );
                assert_eq!(
                    matches.get_one::<String>(session::ARG_LOGIN_REDIRECT).cloned(),
                    Some("/home".to_string())
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                DB_ENV[0],
                DB_ENV[1],
                DB_ENV[2],
                DB_ENV[3],
                ("AUTHGATE_PORT", None),
                ("AUTHGATE_DB_PORT", None),
                ("AUTHGATE_SESSION_TTL", None),
                ("AUTHGATE_SECURE_COOKIE", None),
                ("AUTHGATE_LOGIN_REDIRECT", None),
            ],
            || {
                let matches = new().get_matches_from(vec!["authgate"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
                assert_eq!(matches.get_one::<u16>(ARG_DB_PORT).copied(), Some(5432));
                assert_eq!(
                    matches.get_one::<u64>(session::ARG_SESSION_TTL).copied(),
                    Some(43_200)
                );
                assert!(!matches.get_flag(session::ARG_SECURE_COOKIE));
                assert_eq!(
                    matches.get_one::<String>(session::ARG_LOGIN_REDIRECT).cloned(),
                    Some("dashboard.html".to_string())
                );
            },
        );
    }

    #[test]
    fn test_missing_database_host_is_an_error() {
        temp_env::with_vars(
            [
                ("AUTHGATE_DB_HOST", None),
                DB_ENV[1],
                DB_ENV[2],
                DB_ENV[3],
            ],
            || {
                let result = new().try_get_matches_from(vec!["authgate"]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("AUTHGATE_LOG_LEVEL", Some(level)),
                    DB_ENV[0],
                    DB_ENV[1],
                    DB_ENV[2],
                    DB_ENV[3],
                ],
                || {
                    let command = new();
                    let matches = command.get_matches_from(vec!["authgate"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("AUTHGATE_LOG_LEVEL", None),
                    DB_ENV[0],
                    DB_ENV[1],
                    DB_ENV[2],
                    DB_ENV[3],
                ],
                || {
                    let mut args = vec!["authgate".to_string()];

                    // Add the appropriate number of "-v" flags based on the index
                    if index > 0 {
                        args.push(format!("-{}", "v".repeat(index)));
                    }

                    let matches = new().get_matches_from(args);

                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }
}
