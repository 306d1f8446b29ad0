//! One-time password reset codes
//!
//! A user has at most one pending code and a pending code belongs to exactly
//! one user. Codes are stored hashed and are deleted as soon as they are
//! redeemed.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::hash_token;
use crate::core::db::models::PasswordReset;

/// Lifetime of an emailed reset code
pub const RESET_CODE_TTL_MINUTES: i64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum PasswordResetRepositoryError {
    #[error("Reset code expired")]
    Expired,

    /// Another user already holds this code
    #[error("Reset code already in use")]
    CodeInUse,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct PasswordResetRepository {
    pool: PgPool,
}

impl PasswordResetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a fresh code for `user_id`, replacing any pending one.
    /// Fails with `CodeInUse` if another user holds the same live code.
    pub async fn set_token(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<PasswordReset, PasswordResetRepositoryError> {
        let expires_at = Utc::now() + Duration::minutes(RESET_CODE_TTL_MINUTES);
        let mut tx = self.pool.begin().await?;

        let token_hash = hash_token(code);

        // An expired code still occupies its hash until someone reissues it
        sqlx::query(
            "DELETE FROM password_resets WHERE user_id = $1 OR (token_hash = $2 AND expires_at < NOW())",
        )
        .bind(user_id)
        .bind(&token_hash)
        .execute(&mut *tx)
        .await?;

        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            INSERT INTO password_resets (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PasswordResetRepositoryError::CodeInUse
            }
            e => e.into(),
        })?;

        tx.commit().await?;
        Ok(reset)
    }

    /// Redeem a code. Returns the owning user, or `None` for unknown codes.
    /// The row is removed either way once found; the unique index on
    /// `token_hash` guarantees at most one row matches.
    pub async fn take_token(
        &self,
        code: &str,
    ) -> Result<Option<Uuid>, PasswordResetRepositoryError> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            DELETE FROM password_resets
            WHERE token_hash = $1
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(hash_token(code))
        .fetch_optional(&self.pool)
        .await?;

        match reset {
            Some(r) if r.expires_at < Utc::now() => Err(PasswordResetRepositoryError::Expired),
            Some(r) => Ok(Some(r.user_id)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::models::Role;
    use crate::core::db::repositories::user::test_support::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            PasswordResetRepositoryError::Expired.to_string(),
            "Reset code expired"
        );
        assert_eq!(
            PasswordResetRepositoryError::CodeInUse.to_string(),
            "Reset code already in use"
        );
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_take_token_is_single_use() {
        let pool = create_test_pool().await;
        let user = create_test_user(&pool, Role::Tenant).await;
        let repo = PasswordResetRepository::new(pool.clone());

        let reset = repo.set_token(user.id, "12345").await.unwrap();
        assert_eq!(reset.token_hash, hash_token("12345"));

        assert_eq!(repo.take_token("12345").await.unwrap(), Some(user.id));
        assert_eq!(repo.take_token("12345").await.unwrap(), None);

        cleanup_user(&pool, user.id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_set_token_replaces_pending_code() {
        let pool = create_test_pool().await;
        let user = create_test_user(&pool, Role::Tenant).await;
        let repo = PasswordResetRepository::new(pool.clone());

        repo.set_token(user.id, "11111").await.unwrap();
        repo.set_token(user.id, "22222").await.unwrap();

        assert_eq!(repo.take_token("11111").await.unwrap(), None);
        assert_eq!(repo.take_token("22222").await.unwrap(), Some(user.id));

        cleanup_user(&pool, user.id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_take_token_expired() {
        let pool = create_test_pool().await;
        let user = create_test_user(&pool, Role::Tenant).await;
        let repo = PasswordResetRepository::new(pool.clone());

        sqlx::query(
            "INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, NOW() - INTERVAL '1 minute')",
        )
        .bind(user.id)
        .bind(hash_token("99999"))
        .execute(&pool)
        .await
        .unwrap();

        let result = repo.take_token("99999").await;
        assert!(matches!(result, Err(PasswordResetRepositoryError::Expired)));

        cleanup_user(&pool, user.id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_same_code_cannot_be_held_by_two_users() {
        let pool = create_test_pool().await;
        let alice = create_test_user(&pool, Role::Tenant).await;
        let bob = create_test_user(&pool, Role::Tenant).await;
        let repo = PasswordResetRepository::new(pool.clone());
        let code = "54321";

        repo.set_token(alice.id, code).await.unwrap();
        let clash = repo.set_token(bob.id, code).await;
        assert!(matches!(clash, Err(PasswordResetRepositoryError::CodeInUse)));

        // Bob's failed attempt must not disturb Alice's pending code
        assert_eq!(repo.take_token(code).await.unwrap(), Some(alice.id));
        assert_eq!(repo.take_token(code).await.unwrap(), None);

        // Once redeemed the code is free again
        repo.set_token(bob.id, code).await.unwrap();
        assert_eq!(repo.take_token(code).await.unwrap(), Some(bob.id));

        cleanup_user(&pool, alice.id).await;
        cleanup_user(&pool, bob.id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_expired_code_is_released_for_reuse() {
        let pool = create_test_pool().await;
        let alice = create_test_user(&pool, Role::Tenant).await;
        let bob = create_test_user(&pool, Role::Tenant).await;
        let repo = PasswordResetRepository::new(pool.clone());

        sqlx::query(
            "INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, NOW() - INTERVAL '1 minute')",
        )
        .bind(alice.id)
        .bind(hash_token("77777"))
        .execute(&pool)
        .await
        .unwrap();

        repo.set_token(bob.id, "77777").await.unwrap();
        assert_eq!(repo.take_token("77777").await.unwrap(), Some(bob.id));

        cleanup_user(&pool, alice.id).await;
        cleanup_user(&pool, bob.id).await;
    }
}
