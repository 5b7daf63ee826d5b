use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_EMAIL_API_URL: &str = "email-api-url";
pub const ARG_EMAIL_API_KEY: &str = "email-api-key";
pub const ARG_EMAIL_SENDER: &str = "email-sender";
pub const ARG_EMAIL_TIMEOUT_SECONDS: &str = "email-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    /// Without an API URL verification emails are only logged.
    pub api_url: Option<String>,
    pub api_key: SecretString,
    pub sender: String,
    pub timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the sender is missing after clap defaults are applied.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            api_url: matches.get_one::<String>(ARG_EMAIL_API_URL).cloned(),
            api_key: matches
                .get_one::<String>(ARG_EMAIL_API_KEY)
                .cloned()
                .map(SecretString::from)
                .unwrap_or_default(),
            sender: matches
                .get_one::<String>(ARG_EMAIL_SENDER)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --email-sender"))?,
            timeout_seconds: matches
                .get_one::<u64>(ARG_EMAIL_TIMEOUT_SECONDS)
                .copied()
                .ok_or_else(|| {
                    anyhow::anyhow!("missing required argument: --email-timeout-seconds")
                })?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL_API_URL)
                .long(ARG_EMAIL_API_URL)
                .help("Transactional email API endpoint; codes are only logged when unset")
                .env("GIFTREG_EMAIL_API_URL"),
        )
        .arg(
            Arg::new(ARG_EMAIL_API_KEY)
                .long(ARG_EMAIL_API_KEY)
                .help("API key sent in the api-key header")
                .env("GIFTREG_EMAIL_API_KEY")
                .hide_env_values(true)
                .requires(ARG_EMAIL_API_URL),
        )
        .arg(
            Arg::new(ARG_EMAIL_SENDER)
                .long(ARG_EMAIL_SENDER)
                .help("From address of verification emails")
                .env("GIFTREG_EMAIL_SENDER")
                .default_value("no-reply@giftreg.dev"),
        )
        .arg(
            Arg::new(ARG_EMAIL_TIMEOUT_SECONDS)
                .long(ARG_EMAIL_TIMEOUT_SECONDS)
                .help("Give up on a verification email after this many seconds")
                .env("GIFTREG_EMAIL_TIMEOUT_SECONDS")
                .default_value("3")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
