//! Request and response bodies for the auth endpoints.
//!
//! Field names follow the JSON contract consumed by the web client
//! (camelCase). Optional `code` fields are only populated when the engine is
//! configured to reveal verification codes, so production responses omit them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::FieldError;

/// Candidate profile submitted to start a registration.
///
/// Missing fields deserialize to their empty values so validation can report
/// every problem in one pass instead of failing on the first absent key.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub accepted_privacy_policy: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmEmailRequest {
    pub registration_session_id: Uuid,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResendCodeRequest {
    pub registration_session_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginConfirmRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSessionResponse {
    pub registration_session_id: Uuid,
    /// Unix seconds after which the emailed code stops working.
    pub code_expires: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginSessionResponse {
    /// Unix seconds after which the emailed code stops working.
    pub code_expires: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Error envelope shared by every endpoint.
///
/// `detailedErrors` is only present on registration validation failures.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_errors: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            detailed_errors: None,
        }
    }

    pub fn with_details(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            error: message.into(),
            detailed_errors: Some(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_request_reads_camel_case_keys() -> Result<(), serde_json::Error> {
        let request: RegistrationRequest = serde_json::from_str(
            r#"{
                "firstName": "Ada",
                "lastName": "Lovelace",
                "nickname": "ada",
                "email": "ada@example.com",
                "acceptedPrivacyPolicy": true
            }"#,
        )?;
        assert_eq!(request.first_name, "Ada");
        assert_eq!(request.last_name, "Lovelace");
        assert_eq!(request.nickname, "ada");
        assert_eq!(request.email, "ada@example.com");
        assert!(request.accepted_privacy_policy);
        Ok(())
    }

    #[test]
    fn registration_request_defaults_missing_fields() -> Result<(), serde_json::Error> {
        let request: RegistrationRequest = serde_json::from_str("{}")?;
        assert!(request.first_name.is_empty());
        assert!(request.email.is_empty());
        assert!(!request.accepted_privacy_policy);
        Ok(())
    }

    #[test]
    fn confirm_request_rejects_malformed_session_id() {
        let result: Result<ConfirmEmailRequest, _> =
            serde_json::from_str(r#"{"registrationSessionId": "not-a-uuid", "code": "123456"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn session_response_omits_hidden_code() -> Result<(), serde_json::Error> {
        let response = RegistrationSessionResponse {
            registration_session_id: Uuid::nil(),
            code_expires: 1_700_000_000,
            code: None,
        };
        let json = serde_json::to_string(&response)?;
        assert!(json.contains("registrationSessionId"));
        assert!(json.contains("codeExpires"));
        assert!(!json.contains("\"code\""));
        Ok(())
    }

    #[test]
    fn session_response_includes_revealed_code() -> Result<(), serde_json::Error> {
        let response = LoginSessionResponse {
            code_expires: 1_700_000_000,
            code: Some("123456".to_string()),
        };
        let json = serde_json::to_string(&response)?;
        assert!(json.contains("\"code\":\"123456\""));
        Ok(())
    }

    #[test]
    fn token_response_uses_camel_case_keys() -> Result<(), serde_json::Error> {
        let response = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let json = serde_json::to_string(&response)?;
        assert!(json.contains("accessToken"));
        assert!(json.contains("refreshToken"));
        Ok(())
    }

    #[test]
    fn error_response_carries_field_errors() -> Result<(), serde_json::Error> {
        let response = ErrorResponse::with_details(
            "Registration error",
            vec![FieldError::email_invalid()],
        );
        let json = serde_json::to_string(&response)?;
        assert!(json.contains("detailedErrors"));
        assert!(json.contains("\"field\":\"email\""));
        Ok(())
    }

    #[test]
    fn plain_error_response_omits_details() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&ErrorResponse::new("Server is not responding"))?;
        assert!(!json.contains("detailedErrors"));
        Ok(())
    }
}
