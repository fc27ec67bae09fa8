//! Error taxonomy for the auth engine.
//!
//! Validation failures are collected into a batch of field errors so a client
//! can fix every problem in one round trip. Session and code failures collapse
//! into one generic variant regardless of cause (missing session, wrong code,
//! expired code) so responses cannot be used as an enumeration oracle. Expired
//! and invalid refresh tokens stay distinct so a client can tell "log in
//! again" apart from a possible security event.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn empty(field: &str) -> Self {
        Self::new(field, "Field is empty")
    }

    #[must_use]
    pub fn nickname_forbidden_characters() -> Self {
        Self::new("nickname", "Nickname contains forbidden characters")
    }

    #[must_use]
    pub fn nickname_too_long() -> Self {
        Self::new("nickname", "Nickname is too long")
    }

    #[must_use]
    pub fn nickname_taken() -> Self {
        Self::new("nickname", "Nickname already exists")
    }

    #[must_use]
    pub fn email_invalid() -> Self {
        Self::new("email", "Not a valid email address")
    }

    #[must_use]
    pub fn email_taken() -> Self {
        Self::new("email", "Email already registered")
    }

    #[must_use]
    pub fn privacy_policy_not_accepted() -> Self {
        Self::new("acceptedPrivacyPolicy", "Privacy policy not accepted")
    }
}

/// Message shared by every session/code confirmation failure.
pub const SESSION_NOT_FOUND_OR_EXPIRED: &str =
    "Invalid or expired verification code. Please request a new code and try again";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed")]
    ValidationFailed(Vec<FieldError>),
    #[error("{SESSION_NOT_FOUND_OR_EXPIRED}")]
    SessionNotFoundOrExpired,
    #[error("user not found")]
    UserNotFound,
    #[error("token expires")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("store unavailable")]
    StoreUnavailable(#[from] anyhow::Error),
}
