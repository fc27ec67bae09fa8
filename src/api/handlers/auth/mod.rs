//! Passwordless auth endpoints: registration, login, and token refresh.

pub mod login;
pub mod principal;
pub mod registration;
pub mod refresh;
pub mod types;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::AuthError;
use types::ErrorResponse;

/// Envelope message for registration validation failures.
const REGISTRATION_ERROR: &str = "Registration error";

/// Body for requests that fail to deserialize.
const INVALID_REQUEST_FORMAT: &str = "Invalid request format";

/// Body for store failures; details stay in the logs.
const SERVER_NOT_RESPONDING: &str = "Server is not responding";

/// Map an engine failure onto the wire contract.
pub(crate) fn auth_error_response(err: AuthError) -> Response {
    match err {
        AuthError::ValidationFailed(errors) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(REGISTRATION_ERROR, errors)),
        )
            .into_response(),
        AuthError::SessionNotFoundOrExpired => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(err.to_string())),
        )
            .into_response(),
        AuthError::UserNotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("User not found")),
        )
            .into_response(),
        AuthError::TokenExpired | AuthError::TokenInvalid => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(err.to_string())),
        )
            .into_response(),
        AuthError::StoreUnavailable(source) => {
            error!("Auth store failure: {source:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(SERVER_NOT_RESPONDING)),
            )
                .into_response()
        }
    }
}

/// 400 response for missing or undecodable request bodies.
pub(crate) fn invalid_request_format() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(INVALID_REQUEST_FORMAT)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FieldError;
    use anyhow::anyhow;

    #[test]
    fn validation_failures_are_bad_requests() {
        let response =
            auth_error_response(AuthError::ValidationFailed(vec![FieldError::email_invalid()]));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn session_misses_are_bad_requests() {
        let response = auth_error_response(AuthError::SessionNotFoundOrExpired);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn token_failures_are_unauthorized() {
        assert_eq!(
            auth_error_response(AuthError::TokenExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_error_response(AuthError::TokenInvalid).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn missing_users_are_not_found() {
        let response = auth_error_response(AuthError::UserNotFound);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_failures_are_masked_as_server_errors() {
        let response = auth_error_response(AuthError::StoreUnavailable(anyhow!("pool closed")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn undecodable_bodies_are_bad_requests() {
        assert_eq!(invalid_request_format().status(), StatusCode::BAD_REQUEST);
    }
}
