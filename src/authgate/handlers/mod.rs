pub mod health;
pub use self::health::health;

pub mod root;
pub use self::root::root;

pub mod session;
pub use self::session::{logout, session};

pub mod submission;

pub mod user_register;
pub use self::user_register::register;

pub mod user_login;
pub use self::user_login::login;

// common functions for the handlers
use regex::Regex;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
