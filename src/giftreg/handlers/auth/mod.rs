//! Passwordless login: one-time email codes, sessions, and the auth gate.
//!
//! A visitor submits an email on `POST /login`; when an identity owns it a
//! random code is stored (one pending code per identity) and emailed. The code
//! is then submitted on `POST /verify`, which either bumps the attempt counter,
//! drops the pending code, or consumes it and opens a session in one
//! transaction. The session token travels in the `giftreg_session` cookie and
//! is checked, and its expiration slid forward, by [`gate::auth_gate`] on every
//! request outside the public allowlist.

pub(crate) mod gate;
pub(crate) mod issuer;
pub(crate) mod login;
pub(crate) mod session;
mod state;
mod utils;
pub(crate) mod verifier;

pub use gate::{auth_gate, CurrentIdentity, GateOutcome};
pub use issuer::{issue_code, IssueOutcome};
pub use session::SESSION_COOKIE_NAME;
pub use state::{AuthConfig, AuthState};
pub use verifier::{verify_code, FailureReason, SessionGrant, VerifyOutcome};
