//! Registration, login, and refresh state machines.
//!
//! The engine owns no mutable state between requests; every ordering
//! guarantee comes from the store. Each operation performs its mutations
//! in a single statement or transaction, so a request dropped mid-flight
//! leaves nothing half-applied.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::email::{EmailMessage, EmailSender};
use crate::token::{self, TokenClaims, TokenKind};

use super::code;
use super::config::AuthConfig;
use super::error::{AuthError, FieldError};
use super::models::{
    ClientMeta, IssuedLoginCode, IssuedRegistration, ROLE_USER, RegistrationInput, TokenPair,
    User,
};
use super::store::{ConsumeTokenOutcome, CreateUserOutcome, RoleStore, SessionStore, UserStore};
use super::utils::{
    NICKNAME_MAX_LENGTH, hash_refresh_token, normalize_email, valid_email, valid_nickname,
};

/// Rows reaped by one maintenance sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepTotals {
    pub registration_sessions: u64,
    pub login_sessions: u64,
    pub token_sessions: u64,
}

#[derive(Clone)]
pub struct AuthEngine {
    pool: PgPool,
    config: AuthConfig,
    notifier: Arc<dyn EmailSender>,
}

impl AuthEngine {
    #[must_use]
    pub fn new(pool: PgPool, config: AuthConfig, notifier: Arc<dyn EmailSender>) -> Self {
        Self {
            pool,
            config,
            notifier,
        }
    }

    /// Start a registration: validate the candidate profile, park it in a
    /// session, and deliver a one-time code.
    ///
    /// Violations are collected into one batch so the client can fix every
    /// field in a single round trip. The uniqueness pre-checks are advisory;
    /// the insert constraints at confirmation time remain the authority.
    ///
    /// # Errors
    /// `ValidationFailed` with per-field messages, or `StoreUnavailable`.
    pub async fn begin_registration(
        &self,
        input: RegistrationInput,
    ) -> Result<IssuedRegistration, AuthError> {
        let input = RegistrationInput {
            email: normalize_email(&input.email),
            ..input
        };

        let mut field_errors = validate_profile(&input);

        if nickname_shape_ok(&input.nickname)
            && UserStore::nickname_exists(&self.pool, &input.nickname).await?
        {
            field_errors.push(FieldError::nickname_taken());
        }

        if email_shape_ok(&input.email) && UserStore::email_exists(&self.pool, &input.email).await?
        {
            field_errors.push(FieldError::email_taken());
        }

        if !field_errors.is_empty() {
            return Err(AuthError::ValidationFailed(field_errors));
        }

        let code = code::generate();
        let issued = SessionStore::create_registration_session(
            &self.pool,
            &input,
            &code,
            self.config.code_ttl_seconds(),
        )
        .await?;

        self.deliver_code(&input.email, &code).await;

        info!(session_id = %issued.id, "registration session created");

        Ok(IssuedRegistration {
            session_id: issued.id,
            code_expires_at: issued.code_expires_at,
            code: self.reveal(code),
        })
    }

    /// Confirm a registration code and materialize the user.
    ///
    /// Session consumption, user creation, and the default role assignment
    /// share one transaction: either the session converts into a user with
    /// the `user` role, or nothing happens at all.
    ///
    /// # Errors
    /// `SessionNotFoundOrExpired` for a missing session, a wrong code, or a
    /// lapsed code, without distinguishing which. `ValidationFailed` when a
    /// concurrent registration claimed the nickname or email first.
    pub async fn confirm_email(&self, session_id: Uuid, code: &str) -> Result<Uuid, AuthError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin email confirmation transaction")?;

        let Some(candidate) =
            SessionStore::consume_registration_session(&mut tx, session_id, code).await?
        else {
            return Err(AuthError::SessionNotFoundOrExpired);
        };

        let user_id = match UserStore::create(&mut tx, &candidate).await? {
            CreateUserOutcome::Created(user_id) => user_id,
            CreateUserOutcome::DuplicateNickname => {
                return Err(AuthError::ValidationFailed(vec![FieldError::nickname_taken()]));
            }
            CreateUserOutcome::DuplicateEmail => {
                return Err(AuthError::ValidationFailed(vec![FieldError::email_taken()]));
            }
        };

        let role = RoleStore::get_by_name(&self.pool, ROLE_USER)
            .await?
            .ok_or_else(|| anyhow!("default role {ROLE_USER} is not seeded"))?;

        RoleStore::assign_to_user(&mut tx, user_id, role.id).await?;

        tx.commit()
            .await
            .context("commit email confirmation transaction")?;

        info!(%user_id, "user created via email confirmation");

        Ok(user_id)
    }

    /// Rotate the code of a pending registration and deliver it again.
    ///
    /// # Errors
    /// `StoreUnavailable` only; an unknown session id is answered with a
    /// fabricated but plausible response instead of an error.
    pub async fn resend_verification_code(
        &self,
        session_id: Uuid,
    ) -> Result<IssuedRegistration, AuthError> {
        let code = code::generate();
        let ttl = self.config.code_ttl_seconds();

        let Some(session) = SessionStore::get_registration_session(&self.pool, session_id).await?
        else {
            return Ok(self.masked_resend(session_id, code));
        };

        let Some(code_expires_at) =
            SessionStore::update_registration_code(&self.pool, session_id, &code, ttl).await?
        else {
            // lost a race against a concurrent confirmation or sweep
            return Ok(self.masked_resend(session_id, code));
        };

        self.deliver_code(&session.email, &code).await;

        info!(%session_id, "verification code rotated");

        Ok(IssuedRegistration {
            session_id,
            code_expires_at,
            code: self.reveal(code),
        })
    }

    /// Issue a login code for an email address.
    ///
    /// A session is created whether or not an account exists, and the
    /// response is identical either way; only the delivery is skipped for
    /// unknown addresses. Any prior pending login for the email is
    /// invalidated.
    ///
    /// # Errors
    /// `StoreUnavailable` only.
    pub async fn send_login_code(&self, email: &str) -> Result<IssuedLoginCode, AuthError> {
        let email = normalize_email(email);
        let code = code::generate();

        let code_expires_at = SessionStore::create_login_session(
            &self.pool,
            &email,
            &code,
            self.config.code_ttl_seconds(),
        )
        .await?;

        if UserStore::get_by_email(&self.pool, &email).await?.is_some() {
            self.deliver_code(&email, &code).await;
        } else {
            info!(email = %email, "login code requested for unknown email");
        }

        Ok(IssuedLoginCode {
            code_expires_at,
            code: self.reveal(code),
        })
    }

    /// Confirm a login code and issue a token pair.
    ///
    /// The session consumption and the refresh-session insert share one
    /// transaction; a failure while minting leaves the login code valid so
    /// the user can simply retry.
    ///
    /// # Errors
    /// `SessionNotFoundOrExpired` for any code mismatch, expiry, or an
    /// address that never registered. `StoreUnavailable` on I/O failure.
    pub async fn confirm_login(
        &self,
        email: &str,
        code: &str,
        meta: &ClientMeta,
    ) -> Result<TokenPair, AuthError> {
        let email = normalize_email(email);

        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin login confirmation transaction")?;

        if SessionStore::consume_login_session(&mut tx, &email, code)
            .await?
            .is_none()
        {
            return Err(AuthError::SessionNotFoundOrExpired);
        }

        let Some(user) = UserStore::get_by_email(&self.pool, &email).await? else {
            // a code was parked for an address with no account
            return Err(AuthError::SessionNotFoundOrExpired);
        };

        let roles = RoleStore::user_role_names(&self.pool, user.id).await?;
        let now = token::now_unix_seconds();
        let pair = self.mint_pair(&user, roles, now)?;

        SessionStore::create_token_session(
            &mut tx,
            user.id,
            &hash_refresh_token(&pair.refresh_token),
            meta.user_agent.as_deref(),
            meta.ip.as_deref(),
            self.config.refresh_token_ttl_seconds(),
        )
        .await?;

        tx.commit()
            .await
            .context("commit login confirmation transaction")?;

        info!(user_id = %user.id, "login confirmed, token pair issued");

        Ok(pair)
    }

    /// Exchange a refresh token for a fresh pair, rotating the session.
    ///
    /// Two independent gates: the signature and expiry of the presented
    /// token are verified locally, then the session row is consumed as the
    /// revocation authority. The delete and the replacement insert share a
    /// transaction, so a token value is usable at most once even under
    /// concurrent refresh calls.
    ///
    /// # Errors
    /// `TokenExpired` when either gate reports expiry, `TokenInvalid` for a
    /// bad signature, wrong kind, or a revoked/unknown session.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        meta: &ClientMeta,
    ) -> Result<TokenPair, AuthError> {
        let now = token::now_unix_seconds();

        token::verify_hs256(
            refresh_token,
            self.config.token_secret().expose_secret().as_bytes(),
            TokenKind::Refresh,
            now,
        )
        .map_err(map_token_error)?;

        let mut tx = self.pool.begin().await.context("begin refresh transaction")?;

        let user_id = match SessionStore::consume_token_session(
            &mut tx,
            &hash_refresh_token(refresh_token),
        )
        .await?
        {
            ConsumeTokenOutcome::Taken { user_id } => user_id,
            ConsumeTokenOutcome::Expired => {
                // keep the reap of the stale row
                tx.commit().await.context("commit refresh transaction")?;
                return Err(AuthError::TokenExpired);
            }
            ConsumeTokenOutcome::NotFound => {
                return Err(AuthError::TokenInvalid);
            }
        };

        let Some(user) = UserStore::get_by_id(&self.pool, user_id).await? else {
            return Err(AuthError::TokenInvalid);
        };

        let roles = RoleStore::user_role_names(&self.pool, user.id).await?;
        let pair = self.mint_pair(&user, roles, now)?;

        SessionStore::create_token_session(
            &mut tx,
            user.id,
            &hash_refresh_token(&pair.refresh_token),
            meta.user_agent.as_deref(),
            meta.ip.as_deref(),
            self.config.refresh_token_ttl_seconds(),
        )
        .await?;

        tx.commit().await.context("commit refresh transaction")?;

        info!(user_id = %user.id, "refresh token rotated");

        Ok(pair)
    }

    /// Validate a bearer access token and return its claims.
    ///
    /// # Errors
    /// `TokenExpired` or `TokenInvalid`.
    pub fn verify_access_token(&self, access_token: &str) -> Result<TokenClaims, AuthError> {
        token::verify_hs256(
            access_token,
            self.config.token_secret().expose_secret().as_bytes(),
            TokenKind::Access,
            token::now_unix_seconds(),
        )
        .map_err(map_token_error)
    }

    /// Store-backed role check, for callers that must not trust possibly
    /// stale token claims (roles revoked after the token was minted).
    ///
    /// # Errors
    /// `StoreUnavailable` on I/O failure.
    pub async fn has_role(&self, user_id: Uuid, role_name: &str) -> Result<bool, AuthError> {
        Ok(RoleStore::user_has_role(&self.pool, user_id, role_name).await?)
    }

    /// # Errors
    /// `UserNotFound` when the subject no longer exists.
    pub async fn user_profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        UserStore::get_by_id(&self.pool, user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// # Errors
    /// `StoreUnavailable` on I/O failure.
    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(UserStore::list(&self.pool).await?)
    }

    /// Delete expired sessions of all three kinds.
    ///
    /// # Errors
    /// `StoreUnavailable` on I/O failure.
    pub async fn sweep_expired(&self) -> Result<SweepTotals, AuthError> {
        let registration_sessions =
            SessionStore::delete_expired_registration_sessions(&self.pool).await?;
        let login_sessions = SessionStore::delete_expired_login_sessions(&self.pool).await?;
        let token_sessions = SessionStore::delete_expired_token_sessions(&self.pool).await?;

        Ok(SweepTotals {
            registration_sessions,
            login_sessions,
            token_sessions,
        })
    }

    fn mint_pair(
        &self,
        user: &User,
        roles: Vec<String>,
        now_unix_seconds: i64,
    ) -> Result<TokenPair, AuthError> {
        let secret = self.config.token_secret().expose_secret().as_bytes();

        // Fresh jti per token keeps two same-second mints for the same user
        // from colliding on the session hash.
        let access_claims = TokenClaims::new(
            user.id.to_string(),
            user.email.clone(),
            user.nickname.clone(),
            roles.clone(),
            TokenKind::Access,
            Uuid::new_v4().to_string(),
            now_unix_seconds,
            self.config.access_token_ttl_seconds(),
        );
        let refresh_claims = TokenClaims::new(
            user.id.to_string(),
            user.email.clone(),
            user.nickname.clone(),
            roles,
            TokenKind::Refresh,
            Uuid::new_v4().to_string(),
            now_unix_seconds,
            self.config.refresh_token_ttl_seconds(),
        );

        let access_token = token::sign_hs256(secret, &access_claims)
            .map_err(|err| anyhow::Error::new(err).context("failed to mint access token"))?;
        let refresh_token = token::sign_hs256(secret, &refresh_claims)
            .map_err(|err| anyhow::Error::new(err).context("failed to mint refresh token"))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn deliver_code(&self, to_email: &str, code: &str) {
        let message =
            EmailMessage::verification_code(to_email, code, self.config.code_ttl_seconds() / 60);
        if let Err(err) = self.notifier.send(&message).await {
            error!("Failed to send verification code: {err}");
        }
    }

    /// Fabricate a plausible response for an unknown session id so the
    /// resend endpoint cannot be used to probe which ids are live.
    fn masked_resend(&self, session_id: Uuid, code: String) -> IssuedRegistration {
        IssuedRegistration {
            session_id,
            code_expires_at: token::now_unix_seconds() + self.config.code_ttl_seconds(),
            code: self.reveal(code),
        }
    }

    fn reveal(&self, code: String) -> Option<String> {
        self.config.reveal_codes().then_some(code)
    }
}

fn validate_profile(input: &RegistrationInput) -> Vec<FieldError> {
    let mut field_errors = Vec::new();

    if input.first_name.is_empty() {
        field_errors.push(FieldError::empty("firstName"));
    }

    if input.last_name.is_empty() {
        field_errors.push(FieldError::empty("lastName"));
    }

    if input.nickname.is_empty() {
        field_errors.push(FieldError::empty("nickname"));
    } else if input.nickname.len() > NICKNAME_MAX_LENGTH {
        field_errors.push(FieldError::nickname_too_long());
    } else if !valid_nickname(&input.nickname) {
        field_errors.push(FieldError::nickname_forbidden_characters());
    }

    if input.email.is_empty() {
        field_errors.push(FieldError::empty("email"));
    } else if !valid_email(&input.email) {
        field_errors.push(FieldError::email_invalid());
    }

    if !input.accepted_privacy_policy {
        field_errors.push(FieldError::privacy_policy_not_accepted());
    }

    field_errors
}

fn nickname_shape_ok(nickname: &str) -> bool {
    !nickname.is_empty() && valid_nickname(nickname)
}

fn email_shape_ok(email: &str) -> bool {
    !email.is_empty() && valid_email(email)
}

fn map_token_error(err: token::Error) -> AuthError {
    match err {
        token::Error::Expired => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    }
}
