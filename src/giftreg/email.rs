//! Outbound verification email.
//!
//! The login flow only needs one operation, [`Emailer::send_verification_email`].
//! Delivery failures are reported back to the caller, which logs them and keeps
//! answering the user with the same "check your email" fragment.
//!
//! - [`LogEmailer`] writes the message to the log (local development).
//! - [`HttpEmailer`] posts the message to a transactional mail API.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::{future::Future, pin::Pin, time::Duration};
use tracing::{debug, info, info_span, Instrument};

use crate::APP_USER_AGENT;

const SUBJECT: &str = "Your giftreg login code";

pub type EmailFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub trait Emailer: Send + Sync {
    /// Deliver `code` to every recipient or return an error.
    fn send_verification_email<'a>(
        &'a self,
        recipients: &'a [String],
        code: &'a str,
    ) -> EmailFuture<'a>;
}

fn text_body(code: &str) -> String {
    format!(
        "Use this code to finish signing in to giftreg:\n\n    {code}\n\nThe code expires in a few minutes. If you did not try to sign in, you can ignore this email.\n"
    )
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailer;

impl Emailer for LogEmailer {
    fn send_verification_email<'a>(
        &'a self,
        recipients: &'a [String],
        code: &'a str,
    ) -> EmailFuture<'a> {
        Box::pin(async move {
            info!(recipients = ?recipients, "verification email send stub");
            debug!(code, "verification code for local login");
            Ok(())
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: Vec<EmailAddress<'a>>,
    subject: &'a str,
    text_content: String,
}

/// Sender backed by a JSON mail API (`POST <url>` with an `api-key` header).
#[derive(Debug)]
pub struct HttpEmailer {
    client: Client,
    url: String,
    api_key: SecretString,
    sender: String,
}

impl HttpEmailer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        url: String,
        api_key: SecretString,
        sender: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build email client")?;
        Ok(Self {
            client,
            url,
            api_key,
            sender,
        })
    }

    fn body<'a>(&'a self, recipients: &'a [String], code: &str) -> SendEmailBody<'a> {
        SendEmailBody {
            sender: EmailAddress {
                email: &self.sender,
            },
            to: recipients
                .iter()
                .map(|email| EmailAddress {
                    email: email.as_str(),
                })
                .collect(),
            subject: SUBJECT,
            text_content: text_body(code),
        }
    }
}

impl Emailer for HttpEmailer {
    fn send_verification_email<'a>(
        &'a self,
        recipients: &'a [String],
        code: &'a str,
    ) -> EmailFuture<'a> {
        let span = info_span!("email.send", url = %self.url);
        Box::pin(
            async move {
                if recipients.is_empty() {
                    return Err(anyhow!("no recipients"));
                }

                let response = self
                    .client
                    .post(&self.url)
                    .header("api-key", self.api_key.expose_secret())
                    .json(&self.body(recipients, code))
                    .send()
                    .await
                    .context("failed to reach email API")?;

                let status = response.status();
                if !status.is_success() {
                    // The body may echo the request; keep it out of the error.
                    return Err(anyhow!("{} - {}", self.url, status));
                }

                Ok(())
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_body_contains_code() {
        let body = text_body("ABC234");
        assert!(body.contains("    ABC234\n"));
    }

    #[test]
    fn http_body_serializes_camel_case() -> Result<()> {
        let emailer = HttpEmailer::new(
            "https://mail.test/v3/smtp/email".to_string(),
            SecretString::from("key".to_string()),
            "noreply@giftreg.dev".to_string(),
            Duration::from_secs(5),
        )?;
        let recipients = vec!["user@example.com".to_string()];
        let json = serde_json::to_value(emailer.body(&recipients, "CODE"))?;

        assert_eq!(json["sender"]["email"], "noreply@giftreg.dev");
        assert_eq!(json["to"][0]["email"], "user@example.com");
        assert_eq!(json["subject"], SUBJECT);
        assert!(json["textContent"].as_str().is_some_and(|t| t.contains("CODE")));
        Ok(())
    }

    #[tokio::test]
    async fn http_emailer_rejects_empty_recipients() -> Result<()> {
        let emailer = HttpEmailer::new(
            "https://mail.test/v3/smtp/email".to_string(),
            SecretString::from("key".to_string()),
            "noreply@giftreg.dev".to_string(),
            Duration::from_secs(5),
        )?;
        assert!(emailer.send_verification_email(&[], "CODE").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn log_emailer_always_succeeds() {
        let recipients = vec!["user@example.com".to_string()];
        assert!(LogEmailer
            .send_verification_email(&recipients, "CODE")
            .await
            .is_ok());
    }
}
