use clap::{Arg, ArgMatches, Command};

pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_SECURE_COOKIE: &str = "secure-cookie";
pub const ARG_LOGIN_REDIRECT: &str = "login-redirect";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Idle session TTL in seconds")
                .env("AUTHGATE_SESSION_TTL")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SECURE_COOKIE)
                .long(ARG_SECURE_COOKIE)
                .help("Mark the session cookie Secure (serve over HTTPS only)")
                .env("AUTHGATE_SECURE_COOKIE")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_LOGIN_REDIRECT)
                .long(ARG_LOGIN_REDIRECT)
                .help("Redirect target returned after a successful login")
                .env("AUTHGATE_LOGIN_REDIRECT")
                .default_value("dashboard.html"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub ttl_seconds: u64,
    pub secure_cookie: bool,
    pub login_redirect: String,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL)
                .copied()
                .unwrap_or(43_200),
            secure_cookie: matches.get_flag(ARG_SECURE_COOKIE),
            login_redirect: matches
                .get_one::<String>(ARG_LOGIN_REDIRECT)
                .cloned()
                .unwrap_or_else(|| "dashboard.html".to_string()),
        }
    }
}
