//! # Sesamo (Passwordless Email Code Auth)
//!
//! `sesamo` is a passwordless authentication service. Users register and log
//! in by proving control of an email address with short-lived one-time codes;
//! no passwords are stored or accepted.
//!
//! ## Flows
//!
//! - **Registration:** a candidate profile is parked in a registration session
//!   and a six-digit code is emailed. Confirming the code creates the user and
//!   grants the default `user` role.
//! - **Login:** a code is emailed to the address on file. The response shape
//!   does not reveal whether the address belongs to an account.
//! - **Refresh:** access tokens are short-lived. Refresh tokens are tracked
//!   server side, consumed on first use, and rotate on every refresh.
//!
//! ## Tokens
//!
//! Tokens are HS256-signed JWTs carrying the user id, email, and role names.
//! Refresh tokens are stored hashed so a database leak does not yield usable
//! credentials.
//!
//! ## Authorization
//!
//! Role names travel inside the access token. Endpoints that gate on a role
//! check the token first and fall back to the database, so a role granted
//! after token issuance is honored without waiting for a new token.

pub mod api;
pub mod auth;
pub mod cli;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
