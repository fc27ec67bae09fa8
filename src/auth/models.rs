//! Entities persisted by the credential store.
//!
//! Timestamps are unix seconds (`i64`); all clock arithmetic happens in SQL
//! so there is exactly one time source, the database.

use uuid::Uuid;

/// Identity record. Created only via registration confirmation, with
/// `email_verified` already true.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub email_verified: bool,
    pub accepted_privacy_policy: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Named permission group, many-to-many with users.
#[derive(Debug, Clone)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

/// Default role granted at registration.
pub const ROLE_USER: &str = "user";

/// Reserved role checked by the admin authorization path.
pub const ROLE_ADMIN: &str = "admin";

/// Validated candidate profile, parked in a registration session until the
/// emailed code confirms it.
#[derive(Debug, Clone)]
pub struct RegistrationInput {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub accepted_privacy_policy: bool,
}

/// In-flight registration attempt, keyed by an opaque session id
/// distinct from any future user id.
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub accepted_privacy_policy: bool,
    pub code: String,
    pub code_expires_at: i64,
}

/// In-flight login attempt, keyed by email. At most one live per email.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub email: String,
    pub code: String,
    pub code_expires_at: i64,
}

/// Request metadata recorded on refresh-session rows for audit.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// Access + refresh token strings minted together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Outcome of starting or resending a registration. `code` is populated
/// only when the reveal-codes policy is on; production responses carry
/// the session id and expiry alone.
#[derive(Debug, Clone)]
pub struct IssuedRegistration {
    pub session_id: Uuid,
    pub code_expires_at: i64,
    pub code: Option<String>,
}

/// Outcome of requesting a login code. Deliberately carries no session
/// handle; the email itself keys the pending login.
#[derive(Debug, Clone)]
pub struct IssuedLoginCode {
    pub code_expires_at: i64,
    pub code: Option<String>,
}
