//! Passwordless email-code authentication: registration, login, and
//! refresh-token session lifecycles plus role authorization.

pub mod code;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod schema;
pub mod store;
mod utils;

pub use config::AuthConfig;
pub use engine::{AuthEngine, SweepTotals};
pub use error::{AuthError, FieldError};
pub use models::{
    ClientMeta, IssuedLoginCode, IssuedRegistration, ROLE_ADMIN, ROLE_USER, RegistrationInput,
    TokenPair, User,
};
