//! Check submitted login codes and open sessions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::session::new_session;
use super::state::AuthState;
use super::utils::{codes_match, normalize_email, valid_email};
use crate::giftreg::views;

/// Session handed back to the caller so it can set the cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: String,
    pub expiration: DateTime<Utc>,
}

/// Why a verification ended the login attempt. Only ever logged; users see one
/// generic message for all of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    NoRecord,
    Expired,
    AttemptsExhausted,
    AlreadyConsumed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified(SessionGrant),
    /// Wrong code with attempts left; the record is kept.
    Retry,
    ValidationFailed(&'static str),
    /// Terminal; the user has to request a new code.
    Failed(FailureReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Decision {
    Accept,
    Retry,
    Reject(FailureReason),
}

/// Attempt budget first, then expiry of a matching code, then retry.
fn decide(codes_match: bool, before_expiration: bool, attempts_remaining: bool) -> Decision {
    if !attempts_remaining {
        return Decision::Reject(FailureReason::AttemptsExhausted);
    }
    match (codes_match, before_expiration) {
        (true, true) => Decision::Accept,
        (true, false) => Decision::Reject(FailureReason::Expired),
        (false, _) => Decision::Retry,
    }
}

/// Evaluate one submitted code for `email`.
///
/// Exactly one of these happens per call: the attempt counter is bumped, the
/// record is deleted, or the record is consumed and a session created in the
/// same transaction.
///
/// # Errors
/// Returns an error when the store fails or secure randomness is unavailable.
#[instrument(skip_all)]
pub async fn verify_code(
    state: &AuthState,
    email: &str,
    code: &str,
    user_agent: &str,
) -> Result<VerifyOutcome> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(VerifyOutcome::ValidationFailed(views::EMPTY_CODE));
    }

    let email = normalize_email(email);
    if !valid_email(&email) {
        return Ok(VerifyOutcome::Failed(FailureReason::NoRecord));
    }

    let store = state.store();
    let Some(record) = store.find_verification_by_email(&email).await? else {
        return Ok(VerifyOutcome::Failed(FailureReason::NoRecord));
    };

    let now = Utc::now();
    let decision = decide(
        codes_match(code, &record.code),
        now < record.code_expiration,
        record.attempts.saturating_add(1) < state.config().max_attempts(),
    );
    debug!(identity_id = record.identity_id, ?decision, "verification evaluated");

    match decision {
        Decision::Accept => {
            let session = new_session(record.identity_id, user_agent, now, state.config())?;
            if store.consume_verification(&record, &session).await? {
                Ok(VerifyOutcome::Verified(SessionGrant {
                    token: session.session_token,
                    expiration: session.expiration,
                }))
            } else {
                Ok(VerifyOutcome::Failed(FailureReason::AlreadyConsumed))
            }
        }
        Decision::Retry => {
            store
                .increment_attempts(record.identity_id, &record.code)
                .await?;
            Ok(VerifyOutcome::Retry)
        }
        Decision::Reject(reason) => {
            store.delete_verification(record.identity_id).await?;
            Ok(VerifyOutcome::Failed(reason))
        }
    }
}
