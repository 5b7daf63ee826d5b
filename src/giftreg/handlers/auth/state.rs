//! Auth configuration and the shared state injected into handlers.

use chrono::Duration as TimeDelta;
use std::sync::Arc;
use std::time::Duration;

use crate::giftreg::email::Emailer;
use crate::store::AuthStore;

const DEFAULT_CODE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_MAX_ATTEMPTS: i32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_EMAIL_TIMEOUT_SECONDS: u64 = 3;
/// `attempts + 1 < max_attempts` leaves no retry below two.
pub const MIN_MAX_ATTEMPTS: i32 = 2;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    code_ttl_seconds: i64,
    session_ttl_seconds: i64,
    max_attempts: i32,
    request_timeout: Duration,
    email_timeout: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            email_timeout: Duration::from_secs(DEFAULT_EMAIL_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: i32) -> Self {
        self.max_attempts = attempts.max(MIN_MAX_ATTEMPTS);
        self
    }

    #[must_use]
    pub fn with_request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn with_email_timeout_seconds(mut self, seconds: u64) -> Self {
        self.email_timeout = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn code_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(self.code_ttl_seconds)
    }

    #[must_use]
    pub fn session_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(self.session_ttl_seconds)
    }

    /// Attempts allowed per issued code, including the one being evaluated.
    #[must_use]
    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Upper bound on a single verification email delivery.
    #[must_use]
    pub fn email_timeout(&self) -> Duration {
        self.email_timeout
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicitly constructed context shared by the login handlers and the gate.
pub struct AuthState {
    config: AuthConfig,
    store: Arc<dyn AuthStore>,
    emailer: Arc<dyn Emailer>,
}

impl AuthState {
    pub fn new(config: AuthConfig, store: Arc<dyn AuthStore>, emailer: Arc<dyn Emailer>) -> Self {
        Self {
            config,
            store,
            emailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn AuthStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn emailer(&self) -> &dyn Emailer {
        self.emailer.as_ref()
    }
}
