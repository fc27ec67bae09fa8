//! Login endpoints: request a code by email, then trade code for tokens.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use super::super::client_meta;
use super::types::{
    ErrorResponse, LoginConfirmRequest, LoginRequest, LoginSessionResponse, TokenResponse,
};
use super::{auth_error_response, invalid_request_format};
use crate::auth::AuthEngine;

#[utoipa::path(
    post,
    path = "/auth/v1/login/sendCodeEmail",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login code issued; the response is identical whether or not the account exists", body = LoginSessionResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn send_code(
    engine: Extension<AuthEngine>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return invalid_request_format();
    };

    match engine.send_login_code(&payload.email).await {
        Ok(issued) => (
            StatusCode::OK,
            Json(LoginSessionResponse {
                code_expires: issued.code_expires_at,
                code: issued.code,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/v1/login/confirmEmail",
    request_body = LoginConfirmRequest,
    responses(
        (status = 200, description = "Access and refresh tokens issued", body = TokenResponse),
        (status = 400, description = "Unknown email, expired code, or wrong code", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn confirm_login(
    headers: HeaderMap,
    engine: Extension<AuthEngine>,
    payload: Option<Json<LoginConfirmRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return invalid_request_format();
    };

    let meta = client_meta(&headers);

    match engine
        .confirm_login(&payload.email, &payload.code, &meta)
        .await
    {
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
