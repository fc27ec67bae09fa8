use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub token_secret: SecretString,
    pub email_url: Option<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            email_url: None,
        }
    }

    pub fn set_email_url(&mut self, url: String) {
        self.email_url = Some(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(SecretString::from("hush".to_string()));
        assert_eq!(args.token_secret.expose_secret(), "hush");
        assert!(args.email_url.is_none());
    }

    #[test]
    fn test_set_email_url() {
        let mut args = GlobalArgs::new(SecretString::from("hush".to_string()));
        args.set_email_url("http://localhost:9925/send".to_string());
        assert_eq!(
            args.email_url.as_deref(),
            Some("http://localhost:9925/send")
        );
    }
}
