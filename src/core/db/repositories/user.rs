//! User repository for database operations
//!
//! Users own exactly one role row (`tenants` or `property_managers`), created
//! in the same transaction as the user itself. Passwords are hashed with bcrypt.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{CreateUser, Role, UpdateUser, User};

/// Cost factor for bcrypt hashing
const BCRYPT_COST: u32 = 12;

const USER_COLUMNS: &str = "id, name, email, password_hash, phone_number, profile_image, role, \
                            account_status, placement_date, updated_at";

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already in use")]
    EmailAlreadyExists,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub fn hash_password(password: &str) -> Result<String, UserRepositoryError> {
        bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, UserRepositoryError> {
        bcrypt::verify(password, hash).map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Insert a user together with its role row
    pub async fn insert(&self, dto: &CreateUser) -> Result<User, UserRepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, phone_number, profile_image, role, account_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&dto.name)
        .bind(&dto.email)
        .bind(&dto.password_hash)
        .bind(&dto.phone_number)
        .bind(&dto.profile_image)
        .bind(dto.role.as_str())
        .bind(dto.account_status)
        .fetch_one(&mut *tx)
        .await;

        let user = match inserted {
            Ok(user) => user,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(UserRepositoryError::EmailAlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        match dto.role {
            Role::Tenant => {
                sqlx::query(
                    r#"
                    INSERT INTO tenants (user_id, latitude, longitude)
                    VALUES ($1, 0.0, 0.0)
                    "#,
                )
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
            }
            Role::PropertyManager => {
                sqlx::query(
                    r#"
                    INSERT INTO property_managers (user_id)
                    VALUES ($1)
                    "#,
                )
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %dto.role, "User created");
        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Partially update a user; `None` fields keep their stored value
    pub async fn update(&self, id: Uuid, updates: &UpdateUser) -> Result<User, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET phone_number = COALESCE($2, phone_number),
                profile_image = COALESCE($3, profile_image),
                password_hash = COALESCE($4, password_hash),
                account_status = COALESCE($5, account_status)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&updates.phone_number)
        .bind(&updates.profile_image)
        .bind(&updates.password_hash)
        .bind(updates.account_status)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or(UserRepositoryError::NotFound)
    }

    /// Delete a user (role rows, sessions and resets cascade)
    pub async fn delete(&self, id: Uuid) -> Result<bool, UserRepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Tenant row id for a user, if the user is a tenant
    pub async fn tenant_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, UserRepositoryError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tenants WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    /// Property manager row id for a user, if the user is a manager
    pub async fn manager_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Uuid>, UserRepositoryError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM property_managers WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| r.0))
    }
}
