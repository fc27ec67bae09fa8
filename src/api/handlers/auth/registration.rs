//! Registration endpoints: begin a session, confirm the emailed code, resend.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use super::types::{
    ConfirmEmailRequest, ErrorResponse, RegistrationRequest, RegistrationSessionResponse,
    ResendCodeRequest,
};
use super::{auth_error_response, invalid_request_format};
use crate::auth::{AuthEngine, RegistrationInput};

#[utoipa::path(
    post,
    path = "/auth/v1/registration",
    request_body = RegistrationRequest,
    responses(
        (status = 200, description = "Registration session created, verification code emailed", body = RegistrationSessionResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn register(
    engine: Extension<AuthEngine>,
    payload: Option<Json<RegistrationRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return invalid_request_format();
    };

    let input = RegistrationInput {
        first_name: payload.first_name,
        last_name: payload.last_name,
        nickname: payload.nickname,
        email: payload.email,
        accepted_privacy_policy: payload.accepted_privacy_policy,
    };

    match engine.begin_registration(input).await {
        Ok(issued) => (
            StatusCode::OK,
            Json(RegistrationSessionResponse {
                registration_session_id: issued.session_id,
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
    path = "/auth/v1/registration/confirmEmail",
    request_body = ConfirmEmailRequest,
    responses(
        (status = 200, description = "Account created"),
        (status = 400, description = "Unknown session, expired session, or wrong code", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn confirm_email(
    engine: Extension<AuthEngine>,
    payload: Option<Json<ConfirmEmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return invalid_request_format();
    };

    match engine
        .confirm_email(payload.registration_session_id, &payload.code)
        .await
    {
        Ok(_user_id) => (StatusCode::OK, Json(serde_json::json!({}))).into_response(),
        Err(err) => auth_error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/v1/registration/resendCodeEmail",
    request_body = ResendCodeRequest,
    responses(
        (status = 200, description = "Verification code rotated and re-sent", body = RegistrationSessionResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn resend_code(
    engine: Extension<AuthEngine>,
    payload: Option<Json<ResendCodeRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return invalid_request_format();
    };

    match engine
        .resend_verification_code(payload.registration_session_id)
        .await
    {
        Ok(issued) => (
            StatusCode::OK,
            Json(RegistrationSessionResponse {
                registration_session_id: issued.session_id,
                code_expires: issued.code_expires_at,
                code: issued.code,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(err),
    }
}
