//! Database operations for users, roles, and the three session kinds.
//!
//! Every mutation is a single statement or runs inside a caller-owned
//! transaction, so a cancelled request never leaves partial state behind.
//! Uniqueness is enforced by the database constraints; the `*_exists`
//! pre-checks only exist for fast user-facing feedback.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::models::{LoginSession, RegistrationInput, RegistrationSession, Role, User};
use super::utils::unique_violation_constraint;

/// Outcome when inserting a user row against the uniqueness constraints.
#[derive(Debug)]
pub(crate) enum CreateUserOutcome {
    Created(Uuid),
    DuplicateNickname,
    DuplicateEmail,
}

/// Session id and code expiry returned when a code is issued.
#[derive(Debug)]
pub(crate) struct IssuedCode {
    pub(crate) id: Uuid,
    pub(crate) code_expires_at: i64,
}

/// Outcome of atomically consuming a refresh session by token hash.
#[derive(Debug)]
pub(crate) enum ConsumeTokenOutcome {
    Taken { user_id: Uuid },
    Expired,
    NotFound,
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        nickname: row.get("nickname"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
        accepted_privacy_policy: row.get("accepted_privacy_policy"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const USER_COLUMNS: &str = r"
        id, first_name, last_name, nickname, email, email_verified,
        accepted_privacy_policy,
        EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at,
        EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at
";

pub struct UserStore;

impl UserStore {
    /// Advisory pre-check; the insert constraint remains the authority.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn nickname_exists(pool: &PgPool, nickname: &str) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE nickname = $1) AS present";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(nickname)
            .fetch_one(pool)
            .instrument(span)
            .await
            .context("failed to check nickname existence")?;
        Ok(row.get("present"))
    }

    /// Advisory pre-check; the insert constraint remains the authority.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS present";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_one(pool)
            .instrument(span)
            .await
            .context("failed to check email existence")?;
        Ok(row.get("present"))
    }

    /// Insert a user with `email_verified` already true. A unique violation
    /// is mapped back to the conflicting field instead of an error so a
    /// concurrent duplicate surfaces like the pre-check would have.
    pub(crate) async fn create(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        candidate: &RegistrationInput,
    ) -> Result<CreateUserOutcome> {
        let query = r"
        INSERT INTO users
            (first_name, last_name, nickname, email, email_verified, accepted_privacy_policy)
        VALUES ($1, $2, $3, $4, TRUE, $5)
        RETURNING id
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&candidate.first_name)
            .bind(&candidate.last_name)
            .bind(&candidate.nickname)
            .bind(&candidate.email)
            .bind(candidate.accepted_privacy_policy)
            .fetch_one(&mut **tx)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(CreateUserOutcome::Created(row.get("id"))),
            Err(err) => match unique_violation_constraint(&err).as_deref() {
                Some(constraint) if constraint.contains("nickname") => {
                    Ok(CreateUserOutcome::DuplicateNickname)
                }
                Some(_) => Ok(CreateUserOutcome::DuplicateEmail),
                None => Err(err).context("failed to insert user"),
            },
        }
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to fetch user by id")?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to fetch user by email")?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list(pool: &PgPool) -> Result<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .fetch_all(pool)
            .instrument(span)
            .await
            .context("failed to list users")?;
        Ok(rows.iter().map(user_from_row).collect())
    }
}

pub struct RoleStore;

impl RoleStore {
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>> {
        let query = "SELECT id, name FROM roles WHERE name = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to fetch role by name")?;
        Ok(row.map(|row| Role {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    pub(crate) async fn assign_to_user(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<()> {
        let query = "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(role_id)
            .execute(&mut **tx)
            .instrument(span)
            .await
            .context("failed to assign role to user")?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn user_role_names(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>> {
        let query = r"
        SELECT roles.name
        FROM user_roles
        JOIN roles ON roles.id = user_roles.role_id
        WHERE user_roles.user_id = $1
        ORDER BY roles.name
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(pool)
            .instrument(span)
            .await
            .context("failed to fetch user roles")?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    /// Authorization slow path: consult the store, not the token.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn user_has_role(pool: &PgPool, user_id: Uuid, role_name: &str) -> Result<bool> {
        let query = r"
        SELECT EXISTS(
            SELECT 1
            FROM user_roles
            JOIN roles ON roles.id = user_roles.role_id
            WHERE user_roles.user_id = $1
              AND roles.name = $2
        ) AS present
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(role_name)
            .fetch_one(pool)
            .instrument(span)
            .await
            .context("failed to check user role")?;
        Ok(row.get("present"))
    }
}

pub struct SessionStore;

impl SessionStore {
    /// Persist a new registration session; the database stamps the expiry so
    /// there is one clock for the whole lifecycle.
    pub(crate) async fn create_registration_session(
        pool: &PgPool,
        candidate: &RegistrationInput,
        code: &str,
        ttl_seconds: i64,
    ) -> Result<IssuedCode> {
        let query = r"
        INSERT INTO registration_sessions
            (first_name, last_name, nickname, email, accepted_privacy_policy,
             code, code_expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW() + ($7 * INTERVAL '1 second'))
        RETURNING id, EXTRACT(EPOCH FROM code_expires_at)::BIGINT AS code_expires_at
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&candidate.first_name)
            .bind(&candidate.last_name)
            .bind(&candidate.nickname)
            .bind(&candidate.email)
            .bind(candidate.accepted_privacy_policy)
            .bind(code)
            .bind(ttl_seconds)
            .fetch_one(pool)
            .instrument(span)
            .await
            .context("failed to create registration session")?;
        Ok(IssuedCode {
            id: row.get("id"),
            code_expires_at: row.get("code_expires_at"),
        })
    }

    /// Fetch without an expiry filter: resend must reach sessions whose code
    /// already lapsed so it can rotate them in place.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_registration_session(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<RegistrationSession>> {
        let query = r"
        SELECT id, first_name, last_name, nickname, email, accepted_privacy_policy,
               code, EXTRACT(EPOCH FROM code_expires_at)::BIGINT AS code_expires_at
        FROM registration_sessions
        WHERE id = $1
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to fetch registration session")?;
        Ok(row.map(|row| RegistrationSession {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            nickname: row.get("nickname"),
            email: row.get("email"),
            accepted_privacy_policy: row.get("accepted_privacy_policy"),
            code: row.get("code"),
            code_expires_at: row.get("code_expires_at"),
        }))
    }

    /// Rotate the code in place (same session id, fresh code and expiry).
    /// Returns the new expiry, or `None` if the session vanished.
    pub(crate) async fn update_registration_code(
        pool: &PgPool,
        id: Uuid,
        code: &str,
        ttl_seconds: i64,
    ) -> Result<Option<i64>> {
        let query = r"
        UPDATE registration_sessions
        SET code = $2,
            code_expires_at = NOW() + ($3 * INTERVAL '1 second')
        WHERE id = $1
        RETURNING EXTRACT(EPOCH FROM code_expires_at)::BIGINT AS code_expires_at
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(code)
            .bind(ttl_seconds)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to update registration session code")?;
        Ok(row.map(|row| row.get("code_expires_at")))
    }

    /// Validate and delete a registration session in one statement. Zero rows
    /// means missing, wrong code, or expired; callers treat all three the
    /// same. The delete guarantees a session converts to at most one user,
    /// even under concurrent confirmations.
    pub(crate) async fn consume_registration_session(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        code: &str,
    ) -> Result<Option<RegistrationInput>> {
        let query = r"
        DELETE FROM registration_sessions
        WHERE id = $1
          AND code = $2
          AND code_expires_at > NOW()
        RETURNING first_name, last_name, nickname, email, accepted_privacy_policy
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(code)
            .fetch_optional(&mut **tx)
            .instrument(span)
            .await
            .context("failed to consume registration session")?;
        Ok(row.map(|row| RegistrationInput {
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            nickname: row.get("nickname"),
            email: row.get("email"),
            accepted_privacy_policy: row.get("accepted_privacy_policy"),
        }))
    }

    /// Replace any live login session for the email, atomically. Delete and
    /// insert share one transaction so concurrent sends for the same email
    /// serialize to exactly one surviving row.
    pub(crate) async fn create_login_session(
        pool: &PgPool,
        email: &str,
        code: &str,
        ttl_seconds: i64,
    ) -> Result<i64> {
        let mut tx = pool.begin().await.context("begin login session transaction")?;

        let query = "DELETE FROM login_sessions WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(email)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to delete prior login session")?;

        let query = r"
        INSERT INTO login_sessions (email, code, code_expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        RETURNING EXTRACT(EPOCH FROM code_expires_at)::BIGINT AS code_expires_at
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(code)
            .bind(ttl_seconds)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to create login session")?;

        let code_expires_at: i64 = row.get("code_expires_at");

        tx.commit()
            .await
            .context("commit login session transaction")?;

        Ok(code_expires_at)
    }

    /// Validate and delete a login session by email and code in one
    /// statement; expiry is filtered in SQL. Zero rows reads as an invalid
    /// code, whatever the actual cause.
    pub(crate) async fn consume_login_session(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        email: &str,
        code: &str,
    ) -> Result<Option<LoginSession>> {
        let query = r"
        DELETE FROM login_sessions
        WHERE email = $1
          AND code = $2
          AND code_expires_at > NOW()
        RETURNING email, code, EXTRACT(EPOCH FROM code_expires_at)::BIGINT AS code_expires_at
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(code)
            .fetch_optional(&mut **tx)
            .instrument(span)
            .await
            .context("failed to consume login session")?;
        Ok(row.map(|row| LoginSession {
            email: row.get("email"),
            code: row.get("code"),
            code_expires_at: row.get("code_expires_at"),
        }))
    }

    /// Persist a refresh session keyed by the token hash.
    pub(crate) async fn create_token_session(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        token_hash: &[u8],
        user_agent: Option<&str>,
        ip: Option<&str>,
        ttl_seconds: i64,
    ) -> Result<Uuid> {
        let query = r"
        INSERT INTO token_sessions
            (user_id, token_hash, user_agent, ip, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
        RETURNING id
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(user_agent)
            .bind(ip)
            .bind(ttl_seconds)
            .fetch_one(&mut **tx)
            .instrument(span)
            .await
            .context("failed to create token session")?;
        Ok(row.get("id"))
    }

    /// Delete the refresh session for a presented token hash, reporting
    /// whether it was live, already expired, or absent. The delete is the
    /// validation: under concurrent refreshes of the same token exactly one
    /// caller sees `Taken`, the rest see `NotFound`.
    pub(crate) async fn consume_token_session(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        token_hash: &[u8],
    ) -> Result<ConsumeTokenOutcome> {
        let query = r"
        DELETE FROM token_sessions
        WHERE token_hash = $1
        RETURNING user_id, (expires_at > NOW()) AS live
    ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&mut **tx)
            .instrument(span)
            .await
            .context("failed to consume token session")?;

        Ok(match row {
            None => ConsumeTokenOutcome::NotFound,
            Some(row) if !row.get::<bool, _>("live") => ConsumeTokenOutcome::Expired,
            Some(row) => ConsumeTokenOutcome::Taken {
                user_id: row.get("user_id"),
            },
        })
    }

    /// Revoke every refresh session a user holds ("log out everywhere").
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn delete_user_token_sessions(pool: &PgPool, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM token_sessions WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to delete user token sessions")?;
        Ok(result.rows_affected())
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn delete_expired_registration_sessions(pool: &PgPool) -> Result<u64> {
        let query = "DELETE FROM registration_sessions WHERE code_expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to delete expired registration sessions")?;
        Ok(result.rows_affected())
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn delete_expired_login_sessions(pool: &PgPool) -> Result<u64> {
        let query = "DELETE FROM login_sessions WHERE code_expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to delete expired login sessions")?;
        Ok(result.rows_affected())
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn delete_expired_token_sessions(pool: &PgPool) -> Result<u64> {
        let query = "DELETE FROM token_sessions WHERE expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to delete expired token sessions")?;
        Ok(result.rows_affected())
    }
}
