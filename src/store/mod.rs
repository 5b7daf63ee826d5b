//! Persistence seams for the passwordless login flow.
//!
//! Three collaborators are modelled as object-safe traits so the handlers can
//! hold an `Arc<dyn AuthStore>`:
//!
//! - [`IdentityLookup`]: read-only access to the identity (account) table.
//! - [`VerificationStore`]: at most one pending one-time code per identity.
//! - [`SessionStore`]: cookie-bound sessions with sliding expiration.
//!
//! Every call re-reads from the backing store; nothing is cached in-process so
//! a revoked or expired session can never be masked by stale memory.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::{future::Future, pin::Pin};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// An account a login or session is issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub email: String,
}

/// Single outstanding login attempt for one identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationRecord {
    pub identity_id: i64,
    pub code: String,
    pub code_expiration: DateTime<Utc>,
    pub attempts: i32,
}

/// One authenticated browser session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_token: String,
    pub identity_id: i64,
    pub expiration: DateTime<Utc>,
    pub user_agent: String,
}

/// Rows removed by a sweep of expired records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub sessions: u64,
    pub verifications: u64,
}

pub trait IdentityLookup: Send + Sync {
    /// Find an identity by its (normalized) email address.
    fn find_identity_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<Identity>>;
}

pub trait VerificationStore: Send + Sync {
    /// Insert or overwrite the pending code for `record.identity_id`.
    fn upsert_verification<'a>(&'a self, record: &'a VerificationRecord) -> StoreFuture<'a, ()>;

    /// Load the pending record of the identity owning `email`.
    fn find_verification_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> StoreFuture<'a, Option<VerificationRecord>>;

    /// Bump the attempt counter, but only while the stored code is still `code`.
    fn increment_attempts<'a>(&'a self, identity_id: i64, code: &'a str) -> StoreFuture<'a, ()>;

    fn delete_verification(&self, identity_id: i64) -> StoreFuture<'_, ()>;

    /// Atomically delete `record` (matched on identity and code) and insert
    /// `session`.
    ///
    /// Returns `Ok(false)` without inserting anything when the record was
    /// already consumed or replaced.
    fn consume_verification<'a>(
        &'a self,
        record: &'a VerificationRecord,
        session: &'a SessionRecord,
    ) -> StoreFuture<'a, bool>;
}

pub trait SessionStore: Send + Sync {
    fn insert_session<'a>(&'a self, session: &'a SessionRecord) -> StoreFuture<'a, ()>;

    fn find_session<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<SessionRecord>>;

    /// Move the expiration forward to `expiration`; never moves it backwards.
    ///
    /// Returns the stored expiration after the update, `None` if the session
    /// no longer exists.
    fn extend_session<'a>(
        &'a self,
        token: &'a str,
        expiration: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<DateTime<Utc>>>;

    fn delete_session<'a>(&'a self, token: &'a str) -> StoreFuture<'a, ()>;
}

/// Everything the login flow needs from persistence.
pub trait AuthStore: IdentityLookup + VerificationStore + SessionStore {
    /// Round-trip to the backing store.
    fn ping(&self) -> StoreFuture<'_, ()>;

    /// Remove sessions and verification records that expired before `now`.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreFuture<'_, PurgeCounts>;
}
