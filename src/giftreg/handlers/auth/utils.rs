//! Small helpers for login input validation and secret generation.

use anyhow::{Context, Result};
use axum::http::{header::USER_AGENT, HeaderMap};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;

/// RFC 4648 base32 alphabet; 256 is a multiple of 32 so `byte % 32` is unbiased.
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const CODE_LENGTH: usize = 26;
const SESSION_TOKEN_BYTES: usize = 32;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    email_normalized.len() <= 254
        && Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .map_or(false, |regex| regex.is_match(email_normalized))
}

/// Create a one-time login code: 26 symbols, 130 bits from the OS RNG.
pub(crate) fn generate_verification_code() -> Result<String> {
    let mut bytes = [0u8; CODE_LENGTH];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate verification code")?;
    Ok(bytes
        .iter()
        .map(|byte| char::from(CODE_ALPHABET[usize::from(*byte) % CODE_ALPHABET.len()]))
        .collect())
}

/// Create a new session token for the auth cookie.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Case-insensitive comparison that does not short-circuit on the first mismatch.
pub(crate) fn codes_match(submitted: &str, stored: &str) -> bool {
    let submitted = submitted.trim().as_bytes();
    let stored = stored.as_bytes();
    if submitted.len() != stored.len() {
        return false;
    }
    submitted
        .iter()
        .zip(stored)
        .fold(0u8, |diff, (a, b)| {
            diff | (a.to_ascii_lowercase() ^ b.to_ascii_lowercase())
        })
        == 0
}

/// The request's `User-Agent`, empty when missing or not valid text.
pub(crate) fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
