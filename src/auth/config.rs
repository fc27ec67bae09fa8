//! Auth engine configuration.

use secrecy::SecretString;

use crate::token;

const DEFAULT_CODE_TTL_SECONDS: i64 = 15 * 60;

/// Tunables and policy flags for the auth engine.
///
/// The signing secret is process-wide and read-only after startup; there is
/// no runtime rotation path.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    code_ttl_seconds: i64,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    reveal_codes: bool,
}

impl AuthConfig {
    /// Defaults: 15 minute codes, 15 minute access tokens, 7 day refresh
    /// tokens. Codes are echoed in responses only in debug builds; release
    /// builds rely on out-of-band delivery alone.
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            access_token_ttl_seconds: token::DEFAULT_ACCESS_TTL_SECONDS,
            refresh_token_ttl_seconds: token::DEFAULT_REFRESH_TTL_SECONDS,
            reveal_codes: cfg!(debug_assertions),
        }
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reveal_codes(mut self, reveal: bool) -> Self {
        self.reveal_codes = reveal;
        self
    }

    pub(crate) fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub fn code_ttl_seconds(&self) -> i64 {
        self.code_ttl_seconds
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn reveal_codes(&self) -> bool {
        self.reveal_codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_match_policy() {
        let config = AuthConfig::new(SecretString::from("secret".to_string()));
        assert_eq!(config.code_ttl_seconds(), 15 * 60);
        assert_eq!(config.access_token_ttl_seconds(), 15 * 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 7 * 24 * 60 * 60);
        assert_eq!(config.token_secret().expose_secret(), "secret");
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new(SecretString::from("secret".to_string()))
            .with_code_ttl_seconds(60)
            .with_access_token_ttl_seconds(120)
            .with_refresh_token_ttl_seconds(240)
            .with_reveal_codes(true);
        assert_eq!(config.code_ttl_seconds(), 60);
        assert_eq!(config.access_token_ttl_seconds(), 120);
        assert_eq!(config.refresh_token_ttl_seconds(), 240);
        assert!(config.reveal_codes());
    }
}
