//! Session repository for refresh tokens
//!
//! Refresh tokens are never stored in the clear: only their SHA-256 digest
//! is persisted, so a leaked table cannot be replayed.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::hash_token;
use crate::core::db::models::Session;

/// Default session lifetime, matching the refresh token lifetime
pub const DEFAULT_SESSION_DURATION_DAYS: i64 = 30;

/// Session repository error types
#[derive(Debug, thiserror::Error)]
pub enum SessionRepositoryError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a session for `raw_token`, stored hashed
    pub async fn create(
        &self,
        user_id: Uuid,
        raw_token: &str,
        duration_days: Option<i64>,
    ) -> Result<Session, SessionRepositoryError> {
        let duration = duration_days.unwrap_or(DEFAULT_SESSION_DURATION_DAYS);
        let expires_at = Utc::now() + Duration::days(duration);

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(hash_token(raw_token))
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<Session>, SessionRepositoryError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(raw_token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Look up a live session; expired sessions are removed and reported
    pub async fn validate_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<Session>, SessionRepositoryError> {
        let Some(session) = self.find_by_token(raw_token).await? else {
            return Ok(None);
        };

        if session.expires_at < Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(session.id)
                .execute(&self.pool)
                .await?;
            return Err(SessionRepositoryError::Expired);
        }

        Ok(Some(session))
    }

    /// Remove a session and hand it back, for single-use rotation. Of several
    /// concurrent callers presenting the same token only one gets the row.
    pub async fn take_token(&self, raw_token: &str) -> Result<Session, SessionRepositoryError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            DELETE FROM sessions
            WHERE token_hash = $1
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(hash_token(raw_token))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(SessionRepositoryError::NotFound)?;

        if session.expires_at < Utc::now() {
            return Err(SessionRepositoryError::Expired);
        }
        Ok(session)
    }

    pub async fn delete_by_token(&self, raw_token: &str) -> Result<bool, SessionRepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(hash_token(raw_token))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sign a user out everywhere
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, SessionRepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Drop every session that has already expired
    pub async fn cleanup_expired(&self) -> Result<u64, SessionRepositoryError> {
        self.delete_expired_before(Utc::now()).await
    }

    pub async fn delete_expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, SessionRepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_user_sessions(&self, user_id: Uuid) -> Result<i64, SessionRepositoryError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM sessions
            WHERE user_id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}

/// How often expired sessions are purged
pub const SESSION_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Background task that periodically purges expired sessions
pub struct SessionSweeper {
    repo: SessionRepository,
    period: std::time::Duration,
}

impl SessionSweeper {
    pub fn new(repo: SessionRepository, period: std::time::Duration) -> Self {
        Self { repo, period }
    }

    /// Spawn the sweep loop; the first pass runs immediately
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);

            loop {
                interval.tick().await;

                match self.repo.cleanup_expired().await {
                    Ok(0) => tracing::debug!("Session sweep: nothing expired"),
                    Ok(removed) => tracing::info!(removed, "Expired sessions purged"),
                    Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
                }
            }
        })
    }
}
