//! Issue one-time login codes.

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, error, instrument, warn};

use super::state::AuthState;
use super::utils::{generate_verification_code, normalize_email, valid_email};
use crate::giftreg::views;
use crate::store::{Identity, VerificationRecord};

/// Result of a login request.
///
/// `Issued` and `Silent` must render identically so the response never reveals
/// whether the email belongs to an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A code was stored and handed to the emailer.
    Issued,
    /// No identity matched; nothing was stored or sent.
    Silent,
    /// The input was rejected before touching the store.
    ValidationFailed(&'static str),
}

/// Validate `email`, then store and send a fresh code if an identity owns it.
///
/// The store work is bounded by the request timeout. Delivery has its own
/// timeout, and its failures are logged only, so a slow mail API never
/// changes the outcome for a known email.
///
/// # Errors
/// Returns an error when the store cannot be read or written in time.
#[instrument(skip_all)]
pub async fn issue_code(state: &AuthState, email: &str) -> Result<IssueOutcome> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return Ok(IssueOutcome::ValidationFailed(views::INVALID_EMAIL));
    }

    let limit = state.config().request_timeout();
    let stored = tokio::time::timeout(limit, store_code(state, &email))
        .await
        .map_err(|_| anyhow!("storing verification code timed out after {}s", limit.as_secs()))??;

    let Some((identity, code)) = stored else {
        debug!("login requested for unknown email");
        return Ok(IssueOutcome::Silent);
    };

    deliver_code(state, identity, &code).await;

    Ok(IssueOutcome::Issued)
}

async fn store_code(state: &AuthState, email: &str) -> Result<Option<(Identity, String)>> {
    let Some(identity) = state.store().find_identity_by_email(email).await? else {
        return Ok(None);
    };

    let record = VerificationRecord {
        identity_id: identity.id,
        code: generate_verification_code()?,
        code_expiration: Utc::now() + state.config().code_ttl(),
        attempts: 0,
    };
    state.store().upsert_verification(&record).await?;
    debug!(identity_id = identity.id, "verification code stored");

    Ok(Some((identity, record.code)))
}

async fn deliver_code(state: &AuthState, identity: Identity, code: &str) {
    let limit = state.config().email_timeout();
    let recipients = [identity.email];
    let send = state.emailer().send_verification_email(&recipients, code);

    match tokio::time::timeout(limit, send).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(
            identity_id = identity.id,
            "Failed to send verification email: {err:#}"
        ),
        Err(_) => warn!(
            identity_id = identity.id,
            "Verification email not sent within {}s",
            limit.as_secs()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::giftreg::email::{EmailFuture, Emailer};
    use crate::giftreg::handlers::auth::state::AuthConfig;
    use crate::store::{MemoryStore, VerificationStore};
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingEmailer {
        sent: Mutex<Vec<(Vec<String>, String)>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl Emailer for RecordingEmailer {
        fn send_verification_email<'a>(
            &'a self,
            recipients: &'a [String],
            code: &'a str,
        ) -> EmailFuture<'a> {
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                if let Ok(mut sent) = self.sent.lock() {
                    sent.push((recipients.to_vec(), code.to_string()));
                }
                if self.fail {
                    Err(anyhow!("mail api down"))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn sent(emailer: &RecordingEmailer) -> Vec<(Vec<String>, String)> {
        emailer.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    #[tokio::test]
    async fn issues_code_for_known_identity() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = store.insert_identity("user@x.com").await;
        let emailer = Arc::new(RecordingEmailer::default());
        let state = AuthState::new(AuthConfig::new(), store.clone(), emailer.clone());

        let before = Utc::now();
        let outcome = issue_code(&state, " User@X.com ").await?;
        assert_eq!(outcome, IssueOutcome::Issued);

        let record = store
            .verification(identity.id)
            .await
            .ok_or_else(|| anyhow!("missing verification record"))?;
        assert_eq!(record.attempts, 0);
        assert!(record.code.len() >= 20);
        assert!(record.code_expiration >= before + state.config().code_ttl());

        let sent = sent(&emailer);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, vec!["user@x.com".to_string()]);
        assert_eq!(sent[0].1, record.code);
        Ok(())
    }

    #[tokio::test]
    async fn reissue_overwrites_code_and_resets_attempts() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = store.insert_identity("user@x.com").await;
        let state = AuthState::new(
            AuthConfig::new(),
            store.clone(),
            Arc::new(RecordingEmailer::default()),
        );

        issue_code(&state, "user@x.com").await?;
        let first = store
            .verification(identity.id)
            .await
            .ok_or_else(|| anyhow!("missing first record"))?;
        store.increment_attempts(identity.id, &first.code).await?;

        issue_code(&state, "user@x.com").await?;
        let second = store
            .verification(identity.id)
            .await
            .ok_or_else(|| anyhow!("missing second record"))?;
        assert_ne!(first.code, second.code);
        assert_eq!(second.attempts, 0);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_email_is_silent() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let emailer = Arc::new(RecordingEmailer::default());
        let state = AuthState::new(AuthConfig::new(), store, emailer.clone());

        assert_eq!(
            issue_code(&state, "nobody@x.com").await?,
            IssueOutcome::Silent
        );
        assert!(sent(&emailer).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_email_is_rejected() -> Result<()> {
        let state = AuthState::new(
            AuthConfig::new(),
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingEmailer::default()),
        );
        assert_eq!(
            issue_code(&state, "not-an-email").await?,
            IssueOutcome::ValidationFailed(views::INVALID_EMAIL)
        );
        Ok(())
    }

    #[tokio::test]
    async fn email_failure_does_not_fail_issue() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = store.insert_identity("user@x.com").await;
        let emailer = Arc::new(RecordingEmailer {
            fail: true,
            ..RecordingEmailer::default()
        });
        let state = AuthState::new(AuthConfig::new(), store.clone(), emailer);

        assert_eq!(issue_code(&state, "user@x.com").await?, IssueOutcome::Issued);
        assert!(store.verification(identity.id).await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn slow_email_is_abandoned_without_failing_issue() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = store.insert_identity("user@x.com").await;
        let emailer = Arc::new(RecordingEmailer {
            delay: Some(Duration::from_secs(30)),
            ..RecordingEmailer::default()
        });
        let config = AuthConfig::new()
            .with_request_timeout_seconds(1)
            .with_email_timeout_seconds(1);
        let state = AuthState::new(config, store.clone(), emailer.clone());

        let started = Instant::now();
        assert_eq!(issue_code(&state, "user@x.com").await?, IssueOutcome::Issued);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(store.verification(identity.id).await.is_some());
        assert!(sent(&emailer).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn store_outage_fails_issue() {
        let store = Arc::new(MemoryStore::new());
        store.insert_identity("user@x.com").await;
        store.set_unavailable(true);
        let emailer = Arc::new(RecordingEmailer::default());
        let state = AuthState::new(AuthConfig::new(), store, emailer.clone());

        assert!(issue_code(&state, "user@x.com").await.is_err());
        assert!(sent(&emailer).is_empty());
    }
}
