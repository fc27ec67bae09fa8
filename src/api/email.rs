//! Outbound code delivery.
//!
//! The auth engine hands a composed message to an `EmailSender` and treats
//! delivery failure as non-fatal (logged, the user can request a resend).
//! `LogEmailSender` is the local default; `HttpEmailSender` posts the
//! message to a delivery webhook.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};
use url::Url;

use crate::APP_USER_AGENT;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Compose the one-time code message used by registration and login.
    #[must_use]
    pub fn verification_code(to_email: impl Into<String>, code: &str, expires_minutes: i64) -> Self {
        Self {
            to_email: to_email.into(),
            subject: "Your verification code".to_string(),
            body: format!(
                "Your verification code is: {code}\nThis code will expire in {expires_minutes} minutes."
            ),
        }
    }
}

/// Delivery abstraction consumed by the auth engine.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error; the caller decides whether
    /// failure is fatal.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

/// Sender that posts messages to an HTTP delivery webhook.
#[derive(Clone, Debug)]
pub struct HttpEmailSender {
    client: Client,
    endpoint: Url,
}

impl HttpEmailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut map = HashMap::new();
        map.insert("to", message.to_email.clone());
        map.insert("subject", message.subject.clone());
        map.insert("body", message.body.clone());

        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(&map)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            error!("Failed to deliver email: {status}, {body}");

            return Err(anyhow!("{status}, {body}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_code_message_mentions_code_and_ttl() {
        let message = EmailMessage::verification_code("a@example.com", "123456", 15);
        assert_eq!(message.to_email, "a@example.com");
        assert_eq!(message.subject, "Your verification code");
        assert!(message.body.contains("123456"));
        assert!(message.body.contains("15 minutes"));
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let sender = LogEmailSender;
        let message = EmailMessage::verification_code("a@example.com", "123456", 15);
        assert!(sender.send(&message).await.is_ok());
    }

    #[test]
    fn http_sender_builds_from_url() {
        let url = Url::parse("http://localhost:9925/send").map_err(|e| e.to_string());
        assert!(url.is_ok());
        if let Ok(url) = url {
            assert!(HttpEmailSender::new(url).is_ok());
        }
    }
}
