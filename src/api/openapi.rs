//! OpenAPI document for the auth service.

use crate::{
    api::handlers::{
        auth::{
            login::{__path_confirm_login, __path_send_code},
            refresh::__path_refresh,
            registration::{__path_confirm_email, __path_register, __path_resend_code},
            types,
        },
        health,
        health::__path_health,
        me,
        me::__path_get_me,
        users,
        users::__path_list_users,
    },
    auth::FieldError,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        register,
        confirm_email,
        resend_code,
        send_code,
        confirm_login,
        refresh,
        get_me,
        list_users
    ),
    components(schemas(
        types::RegistrationRequest,
        types::ConfirmEmailRequest,
        types::ResendCodeRequest,
        types::LoginRequest,
        types::LoginConfirmRequest,
        types::RefreshTokenRequest,
        types::RegistrationSessionResponse,
        types::LoginSessionResponse,
        types::TokenResponse,
        types::ErrorResponse,
        FieldError,
        health::Health,
        me::MeResponse,
        users::UserSummary
    )),
    tags(
        (name = "auth", description = "Passwordless email code authentication API"),
        (name = "admin", description = "User administration endpoints"),
        (name = "health", description = "Service health probes")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for route in [
            "/health",
            "/auth/v1/registration",
            "/auth/v1/registration/confirmEmail",
            "/auth/v1/registration/resendCodeEmail",
            "/auth/v1/login/sendCodeEmail",
            "/auth/v1/login/confirmEmail",
            "/auth/v1/refreshToken",
            "/auth/v1/me",
            "/auth/v1/admin/users",
        ] {
            assert!(paths.contains_key(route), "missing {route}");
        }
    }

    #[test]
    fn document_registers_the_error_envelope() {
        let doc = openapi();
        let components = doc.components.unwrap_or_default();
        assert!(components.schemas.contains_key("ErrorResponse"));
        assert!(components.schemas.contains_key("TokenResponse"));
    }
}
