//! # giftreg
//!
//! Household gift registry service. This crate holds the passwordless login
//! core: one-time codes sent by email, cookie sessions with a sliding
//! expiration, and the auth gate that protects every non-public route.
//!
//! ## Login flow
//!
//! 1. `POST /login` looks the email up. Known identities get a fresh random
//!    code (one pending code per identity, attempts reset to zero) which is
//!    emailed; unknown emails get the exact same response.
//! 2. `POST /verify` compares the submitted code case-insensitively. A wrong
//!    code with attempts left keeps the record and bumps the counter; an
//!    expired code or an exhausted attempt budget drops it; a correct code is
//!    consumed and a session is created in the same transaction.
//! 3. The session token is set as a `Secure`, `HttpOnly`, `SameSite=Strict`
//!    cookie. Every request through the gate re-reads the session, revokes it
//!    on a user-agent change, and otherwise slides the expiration forward.

pub mod cli;
pub mod giftreg;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
