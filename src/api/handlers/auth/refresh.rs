//! Refresh-token rotation endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use super::super::client_meta;
use super::types::{ErrorResponse, RefreshTokenRequest, TokenResponse};
use super::{auth_error_response, invalid_request_format};
use crate::auth::AuthEngine;

#[utoipa::path(
    post,
    path = "/auth/v1/refreshToken",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair issued; the old refresh token is dead", body = TokenResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Refresh token expired, revoked, or forged", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    engine: Extension<AuthEngine>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return invalid_request_format();
    };

    let meta = client_meta(&headers);

    match engine.refresh(&payload.refresh_token, &meta).await {
        Ok(pair) => (
            StatusCode::OK,
            Json(TokenResponse {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(err),
    }
}
