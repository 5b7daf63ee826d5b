use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_MAX_ATTEMPTS: &str = "max-attempts";
pub const ARG_REQUEST_TIMEOUT_SECONDS: &str = "request-timeout-seconds";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub code_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub max_attempts: i32,
    pub request_timeout_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if an argument is missing after clap defaults are applied.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            code_ttl_seconds: matches
                .get_one::<i64>(ARG_CODE_TTL_SECONDS)
                .copied()
                .context("missing required argument: --code-ttl-seconds")?,
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .context("missing required argument: --session-ttl-seconds")?,
            max_attempts: matches
                .get_one::<i32>(ARG_MAX_ATTEMPTS)
                .copied()
                .context("missing required argument: --max-attempts")?,
            request_timeout_seconds: matches
                .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
                .copied()
                .context("missing required argument: --request-timeout-seconds")?,
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL_SECONDS)
                .copied()
                .context("missing required argument: --sweep-interval-seconds")?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Lifetime of an emailed login code in seconds")
                .env("GIFTREG_CODE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Idle session lifetime in seconds, extended on every request")
                .env("GIFTREG_SESSION_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MAX_ATTEMPTS)
                .long(ARG_MAX_ATTEMPTS)
                .help("Code submissions allowed per issued code")
                .env("GIFTREG_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(i32).range(2..)),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_SECONDS)
                .long(ARG_REQUEST_TIMEOUT_SECONDS)
                .help("Timeout for login, verify and session checks in seconds")
                .env("GIFTREG_REQUEST_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("Interval between purges of expired sessions and codes, 0 disables")
                .env("GIFTREG_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}
