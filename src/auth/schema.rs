//! Startup schema bootstrap.
//!
//! Every statement is idempotent (`IF NOT EXISTS` / `ON CONFLICT`), so the
//! server can run it on every boot and concurrent replicas can race it
//! safely.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{Instrument, info};

const SCHEMA_SQL: &str = r"
-- Identity records, created only by registration confirmation
CREATE TABLE IF NOT EXISTS users (
    id                      UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    first_name              TEXT NOT NULL,
    last_name               TEXT NOT NULL,
    nickname                TEXT NOT NULL UNIQUE,
    email                   TEXT NOT NULL UNIQUE,
    email_verified          BOOLEAN NOT NULL DEFAULT FALSE,
    accepted_privacy_policy BOOLEAN NOT NULL DEFAULT FALSE,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS roles (
    id   UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role_id)
);

-- Pending registrations; the id is the only handle the client holds
CREATE TABLE IF NOT EXISTS registration_sessions (
    id                      UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    first_name              TEXT NOT NULL,
    last_name               TEXT NOT NULL,
    nickname                TEXT NOT NULL,
    email                   TEXT NOT NULL,
    accepted_privacy_policy BOOLEAN NOT NULL,
    code                    TEXT NOT NULL,
    code_expires_at         TIMESTAMPTZ NOT NULL,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS registration_sessions_email_idx
    ON registration_sessions(email);

-- Email as primary key keeps at most one live login attempt per address
CREATE TABLE IF NOT EXISTS login_sessions (
    email           TEXT PRIMARY KEY,
    code            TEXT NOT NULL,
    code_expires_at TIMESTAMPTZ NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Refresh sessions, addressed by token hash
CREATE TABLE IF NOT EXISTS token_sessions (
    id         UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id    UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash BYTEA NOT NULL UNIQUE,
    user_agent TEXT,
    ip         TEXT,
    expires_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS token_sessions_user_id_idx
    ON token_sessions(user_id);
";

const SEED_ROLES_SQL: &str =
    "INSERT INTO roles (name) VALUES ('user'), ('admin') ON CONFLICT DO NOTHING";

/// Apply the schema and seed the built-in roles.
///
/// # Errors
/// Returns an error if any statement fails to execute.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "CREATE",
        db.statement = "schema bootstrap"
    );

    async {
        for statement in split_statements(SCHEMA_SQL) {
            sqlx::query(&statement)
                .execute(pool)
                .await
                .with_context(|| format!("failed to execute schema statement: {statement}"))?;
        }

        sqlx::query(SEED_ROLES_SQL)
            .execute(pool)
            .await
            .context("failed to seed roles")?;

        info!("database schema ready");
        Ok(())
    }
    .instrument(span)
    .await
}

fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::{SCHEMA_SQL, SEED_ROLES_SQL, split_statements};

    #[test]
    fn split_statements_skips_comment_lines() {
        let sql = r"
-- a comment;
CREATE TABLE widgets(id int);
INSERT INTO widgets(id) VALUES (1);
";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(
            statements
                .first()
                .is_some_and(|statement| statement.contains("CREATE TABLE widgets"))
        );
        assert!(
            statements
                .get(1)
                .is_some_and(|statement| statement.contains("INSERT INTO widgets"))
        );
    }

    #[test]
    fn split_statements_keeps_trailing_statement() {
        let statements = split_statements("SELECT 1");
        assert_eq!(statements, vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn schema_covers_all_tables() {
        let statements = split_statements(SCHEMA_SQL);
        for table in [
            "users",
            "roles",
            "user_roles",
            "registration_sessions",
            "login_sessions",
            "token_sessions",
        ] {
            let create = format!("CREATE TABLE IF NOT EXISTS {table}");
            assert!(
                statements.iter().any(|statement| statement.contains(&create)),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn every_schema_statement_is_idempotent() {
        for statement in split_statements(SCHEMA_SQL) {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "statement not idempotent: {statement}"
            );
        }
    }

    #[test]
    fn seed_roles_is_idempotent() {
        assert!(SEED_ROLES_SQL.contains("ON CONFLICT DO NOTHING"));
        assert!(SEED_ROLES_SQL.contains("'user'"));
        assert!(SEED_ROLES_SQL.contains("'admin'"));
    }
}
