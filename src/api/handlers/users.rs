//! Admin-only user listing.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::auth::auth_error_response;
use super::auth::principal::{require_auth, require_role};
use super::auth::types::ErrorResponse;
use crate::auth::{AuthEngine, ROLE_ADMIN};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub nickname: String,
    pub email: String,
    pub email_verified: bool,
    pub created_at: i64,
}

#[utoipa::path(
    get,
    path = "/auth/v1/admin/users",
    responses(
        (status = 200, description = "All registered users", body = [UserSummary]),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Caller lacks the admin role", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn list_users(headers: HeaderMap, engine: Extension<AuthEngine>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &engine) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    if let Err(response) = require_role(&engine, &principal, ROLE_ADMIN).await {
        return response;
    }

    match engine.list_users().await {
        Ok(users) => {
            let summaries: Vec<UserSummary> = users
                .into_iter()
                .map(|user| UserSummary {
                    id: user.id.to_string(),
                    nickname: user.nickname,
                    email: user.email,
                    email_verified: user.email_verified,
                    created_at: user.created_at,
                })
                .collect();
            (StatusCode::OK, Json(summaries)).into_response()
        }
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
    async fn list_users_requires_a_bearer_token() {
        let response = list_users(HeaderMap::new(), test_engine())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_users_rejects_forged_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer forged"));

        let response = list_users(headers, test_engine()).await.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
