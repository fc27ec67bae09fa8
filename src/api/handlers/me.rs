//! Authenticated profile endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::auth::auth_error_response;
use super::auth::principal::require_auth;
use super::auth::types::ErrorResponse;
use crate::auth::AuthEngine;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub email_verified: bool,
    /// Roles as minted into the access token.
    pub roles: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/auth/v1/me",
    responses(
        (status = 200, description = "The authenticated user's profile", body = MeResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 404, description = "Account no longer exists", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn get_me(headers: HeaderMap, engine: Extension<AuthEngine>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &engine) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match engine.user_profile(principal.user_id).await {
        Ok(user) => (
            StatusCode::OK,
            Json(MeResponse {
                id: user.id.to_string(),
                first_name: user.first_name,
                last_name: user.last_name,
                nickname: user.nickname,
                email: user.email,
                email_verified: user.email_verified,
                roles: principal.claims.roles,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;
    use crate::auth::AuthConfig;
    use axum::http::{HeaderValue, header::AUTHORIZATION};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    const TEST_SECRET: &str = "sesamo-test-signing-secret";

    fn test_engine() -> Extension<AuthEngine> {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        Extension(AuthEngine::new(
            pool,
            AuthConfig::new(SecretString::from(TEST_SECRET)),
            Arc::new(LogEmailSender),
        ))
    }

    #[tokio::test]
    async fn get_me_requires_a_bearer_token() {
        let response = get_me(HeaderMap::new(), test_engine()).await.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn get_me_rejects_forged_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer forged"));

        let response = get_me(headers, test_engine()).await.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
