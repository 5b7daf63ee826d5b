//! `PostgreSQL` implementation of the auth store (see `sql/schema.sql`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{info_span, Instrument, Span};

use super::{
    AuthStore, Identity, IdentityLookup, PurgeCounts, SessionRecord, SessionStore, StoreFuture,
    VerificationRecord, VerificationStore,
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn verification_from_row(row: &PgRow) -> VerificationRecord {
    VerificationRecord {
        identity_id: row.get("identity_id"),
        code: row.get("code"),
        code_expiration: row.get("code_expiration"),
        attempts: row.get("attempts"),
    }
}

fn session_from_row(row: &PgRow) -> SessionRecord {
    SessionRecord {
        session_token: row.get("session_token"),
        identity_id: row.get("identity_id"),
        expiration: row.get("expiration"),
        user_agent: row.get("user_agent"),
    }
}

impl IdentityLookup for PgStore {
    fn find_identity_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<Identity>> {
        Box::pin(async move {
            let query = "SELECT id, email FROM identity WHERE email = $1";
            let row = sqlx::query(query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(db_span("SELECT", query))
                .await
                .context("failed to lookup identity")?;

            Ok(row.map(|row| Identity {
                id: row.get("id"),
                email: row.get("email"),
            }))
        })
    }
}

impl VerificationStore for PgStore {
    fn upsert_verification<'a>(&'a self, record: &'a VerificationRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            // One row per identity: a new code replaces the old one and resets attempts.
            let query = r"
                INSERT INTO verification (identity_id, code, code_expiration, attempts)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (identity_id) DO UPDATE
                SET code = EXCLUDED.code,
                    code_expiration = EXCLUDED.code_expiration,
                    attempts = EXCLUDED.attempts
            ";
            sqlx::query(query)
                .bind(record.identity_id)
                .bind(&record.code)
                .bind(record.code_expiration)
                .bind(record.attempts)
                .execute(&self.pool)
                .instrument(db_span("INSERT", query))
                .await
                .context("failed to upsert verification")?;
            Ok(())
        })
    }

    fn find_verification_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> StoreFuture<'a, Option<VerificationRecord>> {
        Box::pin(async move {
            let query = r"
                SELECT verification.identity_id, verification.code,
                       verification.code_expiration, verification.attempts
                FROM verification
                JOIN identity ON identity.id = verification.identity_id
                WHERE identity.email = $1
            ";
            let row = sqlx::query(query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(db_span("SELECT", query))
                .await
                .context("failed to lookup verification")?;
            Ok(row.as_ref().map(verification_from_row))
        })
    }

    fn increment_attempts<'a>(&'a self, identity_id: i64, code: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            // Matching on the code keeps a concurrent re-issue from inheriting attempts.
            let query = r"
                UPDATE verification
                SET attempts = attempts + 1
                WHERE identity_id = $1 AND code = $2
            ";
            sqlx::query(query)
                .bind(identity_id)
                .bind(code)
                .execute(&self.pool)
                .instrument(db_span("UPDATE", query))
                .await
                .context("failed to increment verification attempts")?;
            Ok(())
        })
    }

    fn delete_verification(&self, identity_id: i64) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let query = "DELETE FROM verification WHERE identity_id = $1";
            sqlx::query(query)
                .bind(identity_id)
                .execute(&self.pool)
                .instrument(db_span("DELETE", query))
                .await
                .context("failed to delete verification")?;
            Ok(())
        })
    }

    fn consume_verification<'a>(
        &'a self,
        record: &'a VerificationRecord,
        session: &'a SessionRecord,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .context("begin verification transaction")?;

            let query = "DELETE FROM verification WHERE identity_id = $1 AND code = $2";
            let deleted = sqlx::query(query)
                .bind(record.identity_id)
                .bind(&record.code)
                .execute(&mut *tx)
                .instrument(db_span("DELETE", query))
                .await
                .context("failed to consume verification")?
                .rows_affected();

            if deleted == 0 {
                // Someone else consumed or replaced the code first.
                tx.rollback()
                    .await
                    .context("rollback verification transaction")?;
                return Ok(false);
            }

            let query = r"
                INSERT INTO session (session_token, identity_id, expiration, user_agent)
                VALUES ($1, $2, $3, $4)
            ";
            sqlx::query(query)
                .bind(&session.session_token)
                .bind(session.identity_id)
                .bind(session.expiration)
                .bind(&session.user_agent)
                .execute(&mut *tx)
                .instrument(db_span("INSERT", query))
                .await
                .context("failed to insert session")?;

            tx.commit()
                .await
                .context("commit verification transaction")?;
            Ok(true)
        })
    }
}

impl SessionStore for PgStore {
    fn insert_session<'a>(&'a self, session: &'a SessionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO session (session_token, identity_id, expiration, user_agent)
                VALUES ($1, $2, $3, $4)
            ";
            sqlx::query(query)
                .bind(&session.session_token)
                .bind(session.identity_id)
                .bind(session.expiration)
                .bind(&session.user_agent)
                .execute(&self.pool)
                .instrument(db_span("INSERT", query))
                .await
                .context("failed to insert session")?;
            Ok(())
        })
    }

    fn find_session<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<SessionRecord>> {
        Box::pin(async move {
            let query = r"
                SELECT session_token, identity_id, expiration, user_agent
                FROM session
                WHERE session_token = $1
            ";
            let row = sqlx::query(query)
                .bind(token)
                .fetch_optional(&self.pool)
                .instrument(db_span("SELECT", query))
                .await
                .context("failed to lookup session")?;
            Ok(row.as_ref().map(session_from_row))
        })
    }

    fn extend_session<'a>(
        &'a self,
        token: &'a str,
        expiration: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<DateTime<Utc>>> {
        Box::pin(async move {
            // Single-row UPDATE is atomic; GREATEST keeps concurrent extensions monotonic.
            let query = r"
                UPDATE session
                SET expiration = GREATEST(expiration, $2)
                WHERE session_token = $1
                RETURNING expiration
            ";
            let row = sqlx::query(query)
                .bind(token)
                .bind(expiration)
                .fetch_optional(&self.pool)
                .instrument(db_span("UPDATE", query))
                .await
                .context("failed to extend session")?;
            Ok(row.map(|row| row.get("expiration")))
        })
    }

    fn delete_session<'a>(&'a self, token: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = "DELETE FROM session WHERE session_token = $1";
            sqlx::query(query)
                .bind(token)
                .execute(&self.pool)
                .instrument(db_span("DELETE", query))
                .await
                .context("failed to delete session")?;
            Ok(())
        })
    }
}

impl AuthStore for PgStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let acquire_span = info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            );
            let mut conn = self
                .pool
                .acquire()
                .instrument(acquire_span)
                .await
                .context("failed to acquire database connection")?;
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            conn.ping()
                .instrument(ping_span)
                .await
                .context("failed to ping database")?;
            Ok(())
        })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreFuture<'_, PurgeCounts> {
        Box::pin(async move {
            let query = "DELETE FROM session WHERE expiration <= $1";
            let sessions = sqlx::query(query)
                .bind(now)
                .execute(&self.pool)
                .instrument(db_span("DELETE", query))
                .await
                .context("failed to purge expired sessions")?
                .rows_affected();

            let query = "DELETE FROM verification WHERE code_expiration <= $1";
            let verifications = sqlx::query(query)
                .bind(now)
                .execute(&self.pool)
                .instrument(db_span("DELETE", query))
                .await
                .context("failed to purge expired verifications")?
                .rows_affected();

            Ok(PurgeCounts {
                sessions,
                verifications,
            })
        })
    }
}
