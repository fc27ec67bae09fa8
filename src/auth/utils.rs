//! Small helpers shared by the auth engine and its storage layer.

use regex::Regex;
use sha2::{Digest, Sha256};

/// Nicknames are alphanumeric only and length-bounded.
pub const NICKNAME_MAX_LENGTH: usize = 32;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Nickname check: ASCII letters and digits only, length-bounded.
pub(crate) fn valid_nickname(nickname: &str) -> bool {
    nickname.len() <= NICKNAME_MAX_LENGTH
        && Regex::new(r"^[a-zA-Z0-9]+$").is_ok_and(|regex| regex.is_match(nickname))
}

/// Hash a refresh token so raw values never touch the database.
/// The hash is used for lookups when the token is presented again.
pub(crate) fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Constraint name of a unique violation, used to map the conflict back to
/// the field the caller submitted.
pub(crate) fn unique_violation_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if is_unique_violation(err) => {
            db_err.constraint().map(str::to_string)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn valid_nickname_accepts_alphanumeric() {
        assert!(valid_nickname("ab12"));
        assert!(valid_nickname("ABC"));
        assert!(valid_nickname(&"a".repeat(NICKNAME_MAX_LENGTH)));
    }

    #[test]
    fn valid_nickname_rejects_symbols_and_length() {
        assert!(!valid_nickname("with space"));
        assert!(!valid_nickname("under_score"));
        assert!(!valid_nickname("dash-ed"));
        assert!(!valid_nickname("émile"));
        assert!(!valid_nickname(&"a".repeat(NICKNAME_MAX_LENGTH + 1)));
    }

    #[test]
    fn hash_refresh_token_is_stable_sha256() {
        let hash = hash_refresh_token("token");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, hash_refresh_token("token"));
        assert_ne!(hash, hash_refresh_token("token2"));
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message())
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
    }

    fn db_error(code: Option<&'static str>, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(TestDbError { code, constraint }))
    }

    #[test]
    fn unique_violation_detected_by_sqlstate() {
        assert!(is_unique_violation(&db_error(Some("23505"), None)));
        assert!(!is_unique_violation(&db_error(Some("23503"), None)));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn unique_violation_constraint_surfaces_name() {
        let err = db_error(Some("23505"), Some("users_nickname_key"));
        assert_eq!(
            unique_violation_constraint(&err).as_deref(),
            Some("users_nickname_key")
        );
        assert_eq!(unique_violation_constraint(&db_error(Some("23503"), Some("x"))), None);
    }
}
