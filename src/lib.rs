//! # Authgate
//!
//! Session-based registration and login for a web application backed by a
//! single `users` table.
//!
//! ## Flow
//!
//! - **Register** validates `nome`, `email`, `senha` and `terms`, checks that
//!   the email is unused, stores an Argon2id hash of the password and inserts
//!   the user.
//! - **Login** looks the user up by email, verifies the password hash and, on
//!   success, regenerates the session identifier before storing `user_id` and
//!   `user_name` in the session (session fixation defense).
//!
//! Unknown emails and wrong passwords produce the same response so the API
//! cannot be used to enumerate accounts. Database failures never leak their
//! cause to the client.

pub mod authgate;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
