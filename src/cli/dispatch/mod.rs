//! Maps parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, email, ARG_DSN, ARG_PORT};
use anyhow::{anyhow, Context, Result};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the DSN is not a
/// Postgres URL.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    validate_dsn(&dsn)?;

    let auth_opts = auth::Options::parse(matches)?;
    let email_opts = email::Options::parse(matches)?;

    if let Some(url) = &email_opts.api_url {
        Url::parse(url).with_context(|| format!("invalid --email-api-url: {url}"))?;
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        code_ttl_seconds: auth_opts.code_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        max_attempts: auth_opts.max_attempts,
        request_timeout_seconds: auth_opts.request_timeout_seconds,
        sweep_interval_seconds: auth_opts.sweep_interval_seconds,
        email_api_url: email_opts.api_url,
        email_api_key: email_opts.api_key,
        email_sender: email_opts.sender,
        email_timeout_seconds: email_opts.timeout_seconds,
    }))
}

fn validate_dsn(dsn: &str) -> Result<()> {
    // Never echo the DSN, it usually carries a password.
    let url = Url::parse(dsn).map_err(|err| anyhow!("invalid --dsn: {err}"))?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(()),
        scheme => Err(anyhow!(
            "invalid --dsn: unsupported scheme '{scheme}', expected postgres or postgresql"
        )),
    }
}
