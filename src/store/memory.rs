//! In-process store used by tests and local experiments.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::{
    AuthStore, Identity, IdentityLookup, PurgeCounts, SessionRecord, SessionStore, StoreFuture,
    VerificationRecord, VerificationStore,
};

#[derive(Debug, Default)]
struct Tables {
    identities: Vec<Identity>,
    verifications: HashMap<i64, VerificationRecord>,
    sessions: HashMap<String, SessionRecord>,
}

/// Map-backed store; a single mutex serializes every operation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity; the email is stored as given.
    pub async fn insert_identity(&self, email: &str) -> Identity {
        let mut tables = self.tables.lock().await;
        let id = i64::try_from(tables.identities.len()).unwrap_or(i64::MAX - 1) + 1;
        let identity = Identity {
            id,
            email: email.to_string(),
        };
        tables.identities.push(identity.clone());
        identity
    }

    pub async fn verification(&self, identity_id: i64) -> Option<VerificationRecord> {
        self.tables
            .lock()
            .await
            .verifications
            .get(&identity_id)
            .cloned()
    }

    pub async fn session(&self, token: &str) -> Option<SessionRecord> {
        self.tables.lock().await.sessions.get(token).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    /// Make every subsequent call fail, as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(anyhow!("store unavailable"))
        } else {
            Ok(())
        }
    }
}

impl IdentityLookup for MemoryStore {
    fn find_identity_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<Identity>> {
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().await;
            Ok(tables
                .identities
                .iter()
                .find(|identity| identity.email == email)
                .cloned())
        })
    }
}

impl VerificationStore for MemoryStore {
    fn upsert_verification<'a>(&'a self, record: &'a VerificationRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().await;
            tables
                .verifications
                .insert(record.identity_id, record.clone());
            Ok(())
        })
    }

    fn find_verification_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> StoreFuture<'a, Option<VerificationRecord>> {
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().await;
            let Some(identity) = tables.identities.iter().find(|i| i.email == email) else {
                return Ok(None);
            };
            Ok(tables.verifications.get(&identity.id).cloned())
        })
    }

    fn increment_attempts<'a>(&'a self, identity_id: i64, code: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().await;
            if let Some(record) = tables.verifications.get_mut(&identity_id) {
                if record.code == code {
                    record.attempts = record.attempts.saturating_add(1);
                }
            }
            Ok(())
        })
    }

    fn delete_verification(&self, identity_id: i64) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check_available()?;
            self.tables.lock().await.verifications.remove(&identity_id);
            Ok(())
        })
    }

    fn consume_verification<'a>(
        &'a self,
        record: &'a VerificationRecord,
        session: &'a SessionRecord,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().await;
            let matches = tables
                .verifications
                .get(&record.identity_id)
                .is_some_and(|stored| stored.code == record.code);
            if !matches {
                return Ok(false);
            }
            if tables.sessions.contains_key(&session.session_token) {
                return Err(anyhow!("duplicate session token"));
            }
            tables.verifications.remove(&record.identity_id);
            tables
                .sessions
                .insert(session.session_token.clone(), session.clone());
            Ok(true)
        })
    }
}

impl SessionStore for MemoryStore {
    fn insert_session<'a>(&'a self, session: &'a SessionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().await;
            if tables.sessions.contains_key(&session.session_token) {
                return Err(anyhow!("duplicate session token"));
            }
            tables
                .sessions
                .insert(session.session_token.clone(), session.clone());
            Ok(())
        })
    }

    fn find_session<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<SessionRecord>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.tables.lock().await.sessions.get(token).cloned())
        })
    }

    fn extend_session<'a>(
        &'a self,
        token: &'a str,
        expiration: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<DateTime<Utc>>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().await;
            Ok(tables.sessions.get_mut(token).map(|session| {
                session.expiration = session.expiration.max(expiration);
                session.expiration
            }))
        })
    }

    fn delete_session<'a>(&'a self, token: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            self.tables.lock().await.sessions.remove(token);
            Ok(())
        })
    }
}

impl AuthStore for MemoryStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreFuture<'_, PurgeCounts> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.lock().await;
            let sessions_before = tables.sessions.len();
            tables.sessions.retain(|_, session| session.expiration > now);
            let verifications_before = tables.verifications.len();
            tables
                .verifications
                .retain(|_, record| record.code_expiration > now);
            Ok(PurgeCounts {
                sessions: (sessions_before - tables.sessions.len()) as u64,
                verifications: (verifications_before - tables.verifications.len()) as u64,
            })
        })
    }
}
