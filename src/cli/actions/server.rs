use crate::giftreg::{
    self,
    email::{Emailer, HttpEmailer, LogEmailer},
    AuthConfig,
};
use anyhow::Result;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub code_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub max_attempts: i32,
    pub request_timeout_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub email_api_url: Option<String>,
    pub email_api_key: SecretString,
    pub email_sender: String,
    pub email_timeout_seconds: u64,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new()
            .with_code_ttl_seconds(self.code_ttl_seconds)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_max_attempts(self.max_attempts)
            .with_request_timeout_seconds(self.request_timeout_seconds)
            .with_email_timeout_seconds(self.email_timeout_seconds)
    }

    fn emailer(&self, timeout: Duration) -> Result<Arc<dyn Emailer>> {
        match &self.email_api_url {
            Some(url) => Ok(Arc::new(HttpEmailer::new(
                url.clone(),
                self.email_api_key.clone(),
                self.email_sender.clone(),
                timeout,
            )?)),
            None => {
                warn!("No email API configured, verification codes are only logged");
                Ok(Arc::new(LogEmailer))
            }
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the email client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config();
    let emailer = args.emailer(auth_config.email_timeout())?;

    debug!(
        port = args.port,
        code_ttl_seconds = args.code_ttl_seconds,
        session_ttl_seconds = args.session_ttl_seconds,
        max_attempts = args.max_attempts,
        "starting server"
    );

    giftreg::new(
        args.port,
        args.dsn,
        auth_config,
        emailer,
        Duration::from_secs(args.sweep_interval_seconds),
    )
    .await
}
